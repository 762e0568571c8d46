use crate::context::{Context, TemplateOverrides};
use colored::Colorize;
use gceflow_cloud::Node;
use tokio::sync::watch;

pub async fn handle(
    ctx: &Context,
    group: &str,
    count: usize,
    overrides: TemplateOverrides,
) -> anyhow::Result<()> {
    let template = ctx.template(overrides)?;
    println!(
        "グループ {} にノードを {} 台作成します ({})",
        group.cyan(),
        count,
        ctx.settings.zone
    );

    // Ctrl-C で新規作成を止める。起動済みのノードは完了まで待つ
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "中断しました。起動済みのノードを待っています...".yellow());
            let _ = cancel_tx.send(true);
        }
    });

    let report = ctx
        .orchestrator
        .create_nodes_cancellable(group, count, &template, cancel_rx)
        .await;
    interrupt.abort();
    let report = report?;

    for node in report.nodes() {
        print_node(&node);
    }
    super::print_failures(&report.failed);
    super::print_shared(&report.shared);

    println!(
        "作成 {} 台、失敗 {} 台 ({:.1}秒)",
        report.created.len().to_string().green(),
        report.failed.len().to_string().red(),
        report.duration_ms as f64 / 1000.0
    );

    if !report.is_success() {
        anyhow::bail!("{} 台のノードの作成に失敗しました", report.failed.len());
    }
    Ok(())
}

fn print_node(node: &Node) {
    println!(
        "  {} {} {} {}",
        "✓".green(),
        node.id.to_string().bold(),
        node.public_ips.join(",").cyan(),
        node.image_id().unwrap_or("-").dimmed()
    );
}
