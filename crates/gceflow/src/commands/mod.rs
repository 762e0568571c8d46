pub mod create;
pub mod destroy;
pub mod list;
pub mod reclaim;

use colored::Colorize;
use gceflow_cloud::{NodeFailure, SharedResources};

pub(crate) fn print_failures(failures: &[NodeFailure]) {
    for failure in failures {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.name.bold(),
            failure.error
        );
    }
}

pub(crate) fn print_shared(shared: &[SharedResources]) {
    for outcome in shared {
        match outcome {
            SharedResources::Reclaimed { network, firewalls } => {
                println!(
                    "  {} ネットワーク {} を回収しました (ファイアウォール {} 件)",
                    "✓".green(),
                    network.cyan(),
                    firewalls.len()
                );
            }
            SharedResources::InUse { network, remaining } => {
                println!(
                    "  {} ネットワーク {} は使用中のため残します (インスタンス {} 台)",
                    "•".dimmed(),
                    network.cyan(),
                    remaining
                );
            }
            SharedResources::Retained { network } => {
                println!(
                    "  {} ネットワーク {} は回収対象なし",
                    "•".dimmed(),
                    network.cyan()
                );
            }
            SharedResources::Failed { network, message } => {
                println!(
                    "  {} ネットワーク {} の回収に失敗: {}",
                    "✗".red(),
                    network.cyan(),
                    message
                );
                println!(
                    "    {} gceflow reclaim {}",
                    "再実行:".yellow(),
                    network
                );
            }
        }
    }
}
