use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認しました:\n{}\n\
        GCEFLOW_CONFIG_PATH 環境変数で直接指定することもできます",
        format_paths(.searched)
    )]
    SettingsFileNotFound { searched: Vec<PathBuf> },

    #[error("GCEFLOW_CONFIG_PATH が存在しないファイルを指しています: {}", .0.display())]
    ConfigPathMissing(PathBuf),

    #[error("設定が不正です: {0}")]
    Invalid(String),

    #[error("YAML パースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("- {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, ConfigError>;
