mod commands;
mod context;

use clap::{Parser, Subcommand};
use gceflow_cloud::NodeId;

#[derive(Parser)]
#[command(name = "gceflow")]
#[command(about = "Compute Engine のノードグループを作成・削除する", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// グループにノードを作成
    Create {
        /// グループ名 (ノード名は <group>-<n> になる)
        group: String,
        /// 作成するノード数
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        /// 追加のインスタンスタグ（複数指定可）
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// ネットワーク名 (デフォルト: <prefix>-<group>)
        #[arg(long)]
        network: Option<String>,
        /// グループのファイアウォールで開放するポート（複数指定可）
        #[arg(short, long = "port")]
        ports: Vec<u16>,
        /// マシンタイプ (例: f1-micro)
        #[arg(long)]
        machine_type: Option<String>,
        /// イメージ (project/image、イメージ名、または完全なリンク)
        #[arg(long)]
        image: Option<String>,
        /// ブートディスクのサイズ (GB)
        #[arg(long)]
        disk_size: Option<u32>,
    },
    /// ノードを削除し、使われなくなったネットワークを回収
    Destroy {
        /// ノードID (<zone>/<name>)
        node: String,
    },
    /// グループの全ノードを削除
    DestroyGroup {
        /// グループ名
        group: String,
    },
    /// ネットワークとファイアウォールを回収（インスタンスが残っていれば何もしない）
    Reclaim {
        /// ネットワーク名
        network: String,
    },
    /// ノードの一覧を表示
    List {
        /// このグループのノードのみ
        #[arg(short, long)]
        group: Option<String>,
    },
    /// バージョンを表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // バージョン表示は設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("gceflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // 不正なノードIDは設定の読み込み前にエラー
    let node_id = match &cli.command {
        Commands::Destroy { node } => Some(node.parse::<NodeId>()?),
        _ => None,
    };

    let ctx = context::Context::load()?;

    match cli.command {
        Commands::Create {
            group,
            count,
            tags,
            network,
            ports,
            machine_type,
            image,
            disk_size,
        } => {
            let overrides = context::TemplateOverrides {
                tags,
                network,
                ports,
                machine_type,
                image,
                disk_size,
            };
            commands::create::handle(&ctx, &group, count, overrides).await?;
        }
        Commands::Destroy { .. } => {
            if let Some(id) = node_id {
                commands::destroy::handle_node(&ctx, &id).await?;
            }
        }
        Commands::DestroyGroup { group } => {
            commands::destroy::handle_group(&ctx, &group).await?;
        }
        Commands::Reclaim { network } => {
            commands::reclaim::handle(&ctx, &network).await?;
        }
        Commands::List { group } => {
            commands::list::handle(&ctx, group.as_deref()).await?;
        }
        Commands::Version => {
            unreachable!("Version は設定読み込み前に処理済み");
        }
    }

    Ok(())
}
