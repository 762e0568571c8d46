use crate::context::Context;
use colored::Colorize;
use gceflow_cloud::NodeId;

pub async fn handle_node(ctx: &Context, id: &NodeId) -> anyhow::Result<()> {
    println!("{} を削除します", id.to_string().cyan());
    let shared = ctx.orchestrator.destroy_node(id).await?;
    println!("  {} {}", "✓".green(), id);
    if shared.is_empty() {
        println!("{}", "  回収対象なし".dimmed());
    }
    super::print_shared(&shared);
    Ok(())
}

pub async fn handle_group(ctx: &Context, group: &str) -> anyhow::Result<()> {
    println!("グループ {} を削除します", group.cyan());
    let report = ctx.orchestrator.destroy_group(group).await?;

    if report.destroyed.is_empty() && report.failed.is_empty() {
        println!("{}", "グループにノードがありません".dimmed());
    }
    for name in &report.destroyed {
        println!("  {} {}", "✓".green(), name);
    }
    super::print_failures(&report.failed);
    super::print_shared(&report.shared);

    if !report.is_success() {
        if report.failed.is_empty() {
            anyhow::bail!("共有リソースの回収に失敗しました");
        }
        anyhow::bail!("{} 台のノードを削除できませんでした", report.failed.len());
    }
    Ok(())
}
