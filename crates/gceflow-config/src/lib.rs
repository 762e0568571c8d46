pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "GCEFLOW_CONFIG_PATH";

/// ローカル設定を優先する順
const FILE_NAMES: [&str; 4] = [
    "gceflow.local.yaml",
    ".gceflow.local.yaml",
    "gceflow.yaml",
    ".gceflow.yaml",
];

/// gceflowの設定ディレクトリ（なければ作成）
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("gceflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// `dir` を起点にした検索候補を優先順に並べる
///
/// 1. `dir` 直下の FILE_NAMES
/// 2. `dir/.gceflow/` 内の FILE_NAMES
/// 3. グローバル設定 `global_dir/gceflow.yaml`
pub fn search_paths(dir: &Path, global_dir: Option<&Path>) -> Vec<PathBuf> {
    let local_dir = dir.join(".gceflow");
    [dir, local_dir.as_path()]
        .iter()
        .flat_map(|base| FILE_NAMES.iter().map(move |name| base.join(name)))
        .chain(global_dir.map(|global| global.join("gceflow").join("gceflow.yaml")))
        .collect()
}

/// 設定ファイルを探す
///
/// `GCEFLOW_CONFIG_PATH` が設定されていればそれだけを見る。
/// なければカレントディレクトリから [`search_paths`] の順に探す。
pub fn find_settings_file() -> Result<PathBuf> {
    if let Some(config_path) = std::env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::ConfigPathMissing(path))
        };
    }

    let current_dir = std::env::current_dir()?;
    let global_dir = dirs::config_dir();
    let searched = search_paths(&current_dir, global_dir.as_deref());
    match searched.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(ConfigError::SettingsFileNotFound { searched }),
    }
}

/// 検索・パース・環境変数の上書き・検証までをまとめて行う
pub fn load_settings() -> Result<Settings> {
    let path = find_settings_file()?;
    let mut settings = Settings::load(&path)?;
    settings.apply_env();
    settings.validate()?;
    Ok(settings)
}
