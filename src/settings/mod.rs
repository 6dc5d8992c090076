pub mod catalog;
pub mod tree;
pub mod value;

pub use catalog::EOS_KNOWN_SETTINGS;
pub use tree::{ConfigurationTree, SnapshotCache};
pub use value::{match_choice, SettingInput, SettingValue};
