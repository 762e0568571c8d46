use crate::context::Context;
use colored::Colorize;

pub async fn handle(ctx: &Context, network: &str) -> anyhow::Result<()> {
    println!("ネットワーク {} を回収します", network.cyan());
    let outcome = ctx.orchestrator.reclaim_network(network).await?;
    super::print_shared(std::slice::from_ref(&outcome));

    if outcome.is_failed() {
        anyhow::bail!("ネットワーク {} の回収に失敗しました", network);
    }
    Ok(())
}
