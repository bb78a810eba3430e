pub mod config;
pub mod deletion;
pub mod impact;
pub mod operations;
pub mod quarantine;
pub mod report;
pub mod runner;
pub mod testing;
pub mod torrent_client;
pub mod unregistered;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use deletion::{CrossSeedCheck, CrossSeedChecker, DeletionExecutor, DeletionReport, SafetyError};
pub use impact::{ImpactAnalyzer, ImpactSummary};
pub use operations::Operation;
pub use quarantine::{DeletionType, QuarantineError, QuarantineMover, QuarantineReport};
pub use report::{OperationReport, RunReport};
pub use runner::{MaintenanceRunner, RunOutcome};
pub use torrent_client::{
    load_snapshot, CachedClient, QBittorrentClient, Torrent, TorrentClient, TorrentClientError,
    TorrentReader,
};
pub use unregistered::{Classification, Classifier, PatternSet};
