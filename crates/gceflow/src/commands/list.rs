use crate::context::Context;
use colored::Colorize;
use gceflow_cloud::InstanceStatus;

pub async fn handle(ctx: &Context, group: Option<&str>) -> anyhow::Result<()> {
    let nodes = ctx.orchestrator.list_nodes(group).await?;

    if nodes.is_empty() {
        println!("{}", "ノードがありません".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<36} {:<12} {:<12} {:<16} {:<16} {:<28}",
            "NODE", "GROUP", "STATUS", "PRIVATE IP", "PUBLIC IP", "IMAGE"
        )
        .bold()
    );
    println!("{}", "─".repeat(124).dimmed());

    for node in nodes {
        let status = node.status.to_string();
        let status = match node.status {
            InstanceStatus::Running => status.green(),
            InstanceStatus::Provisioning | InstanceStatus::Staging => status.yellow(),
            _ => status.red(),
        };
        println!(
            "{:<36} {:<12} {:<12} {:<16} {:<16} {:<28}",
            node.id.to_string(),
            node.group.as_deref().unwrap_or("-"),
            status,
            node.private_ips.first().map(String::as_str).unwrap_or("-"),
            node.public_ips.first().map(String::as_str).unwrap_or("-"),
            node.image_id().unwrap_or("-")
        );
    }
    Ok(())
}
