#[cfg(test)]
mod tests {
    use crate::config::{
        ConfigBuilder, ConfigLoader, EmbeddingServiceType, FusionWeights, LodestarConfig,
        LogLevel, ModeWeightTable, RerankServiceType, validation,
    };
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = LodestarConfig::default();
        assert_eq!(config.retrieval.knowledge_timeout, Duration::from_millis(50));
        assert_eq!(config.retrieval.graph_timeout, Duration::from_millis(15));
        assert_eq!(config.retrieval.embedding_timeout, Duration::from_millis(20));
        assert_eq!(config.rerank.timeout, Duration::from_millis(30));
        assert_eq!(config.rerank.min_candidates, 5);
        assert_eq!(config.rerank.top_k, 50);
        assert_eq!(config.rerank.service_type, RerankServiceType::Vector);
        assert_eq!(config.ml.embedding.service_type, EmbeddingServiceType::Local);
        assert_eq!(config.fusion.recency_half_life_hours, 168.0);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_default_weights_match_documented_values() {
        let weights = FusionWeights::default();
        assert_eq!(weights.knowledge, 0.30);
        assert_eq!(weights.neural, 0.25);
        assert_eq!(weights.temporal, 0.15);
        assert_eq!(weights.actor, 0.10);
        assert_eq!(weights.graph, 0.10);
        assert_eq!(weights.recency, 0.07);
        assert_eq!(weights.importance, 0.03);
    }

    #[test]
    fn test_every_mode_row_sums_to_one() {
        let table = ModeWeightTable::default();
        for (mode, weights) in table.rows() {
            assert!(
                (weights.sum() - 1.0).abs() < 1e-4,
                "mode {} sums to {}",
                mode,
                weights.sum()
            );
        }
        assert!(table.temporal.temporal > table.hybrid.temporal);
        assert!(table.temporal.recency > table.hybrid.recency);
        assert!(table.actor.actor > table.hybrid.actor);
    }

    #[test]
    fn test_validation_rejects_unbalanced_weights() {
        let mut table = ModeWeightTable::default();
        table.actor.actor = 0.9;
        let result = ConfigBuilder::new().with_fusion_weights(table).build();
        assert!(result.is_err());

        let negative = FusionWeights::new(1.1, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(validation::validate_weights("hybrid", &negative).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_graph_settings() {
        let mut config = LodestarConfig::default();
        config.retrieval.graph.max_hops = 3;
        config.retrieval.graph.hop_factors = vec![1.0, 0.6, 0.3];
        assert!(validation::validate_config(&config).is_err());

        let mut config = LodestarConfig::default();
        config.retrieval.graph.hop_factors = vec![0.6, 1.0];
        assert!(validation::validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout_and_half_life() {
        let result = ConfigBuilder::new()
            .with_generator_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());

        let result = ConfigBuilder::new()
            .with_recency_half_life_hours(0.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_services_require_url() {
        let mut config = LodestarConfig::default();
        config.rerank.service_type = RerankServiceType::Remote;
        assert!(validation::validate_config(&config).is_err());

        let config = ConfigBuilder::new()
            .with_remote_rerank("http://rerank.internal")
            .build();
        assert!(config.is_ok());

        let config = ConfigBuilder::new()
            .with_remote_embeddings("", "text-embedding-3-small", 1536)
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(
            ConfigBuilder::new()
                .with_name_similarity_threshold(1.5)
                .build()
                .is_err()
        );
        assert!(
            ConfigBuilder::new()
                .with_name_similarity_threshold(0.9)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_predefined_configs() {
        let dev = ConfigBuilder::development().build().unwrap();
        let test = ConfigBuilder::testing().build().unwrap();
        let prod = ConfigBuilder::production().build().unwrap();

        assert_eq!(dev.logging.level, LogLevel::Debug);
        assert_eq!(test.storage.data_dir, PathBuf::from("./test_data"));
        assert_eq!(test.ml.embedding.dimensions, 128);
        assert_eq!(prod.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_loader_reads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[retrieval]
default_limit = 25
graph_timeout = "10ms"

[rerank]
top_k = 20

[storage]
snapshot_file = "/tmp/workspace.json"
"#
        )
        .unwrap();

        let mut loader = ConfigLoader::new();
        loader.load_file(file.path()).unwrap();
        let config = loader.extract().unwrap();

        assert_eq!(config.retrieval.default_limit, 25);
        assert_eq!(config.retrieval.graph_timeout, Duration::from_millis(10));
        assert_eq!(config.rerank.top_k, 20);
        assert_eq!(
            config.storage.snapshot_file,
            Some(PathBuf::from("/tmp/workspace.json"))
        );
        // Untouched sections keep their defaults
        assert_eq!(config.rerank.min_candidates, 5);
    }

    #[test]
    fn test_loader_validates_file_contents() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"fusion": {{"recency_half_life_hours": -1.0}}}}"#).unwrap();

        let mut loader = ConfigLoader::new();
        loader.load_file(file.path()).unwrap();
        assert!(loader.extract().is_err());
    }

    #[test]
    fn test_loader_rejects_missing_and_unknown_files() {
        let mut loader = ConfigLoader::new();
        assert!(loader.load_file("/definitely/not/here.toml").is_err());

        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(loader.load_file(file.path()).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = ConfigBuilder::new()
            .with_data_dir("/tmp/test_data")
            .with_local_embeddings(64)
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: LodestarConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.storage.data_dir, deserialized.storage.data_dir);
        assert_eq!(deserialized.ml.embedding.dimensions, 64);
        assert_eq!(config.fusion.weights, deserialized.fusion.weights);
    }
}
