//! List the models the server offers

use parley_ai::ChatProvider;

use super::Context;

pub async fn models(ctx: &Context) -> anyhow::Result<()> {
    let mut models = ctx.provider.list_models().await?;
    models.sort_by(|a, b| a.id.cmp(&b.id));

    if models.is_empty() {
        println!("The server reported no models.");
        return Ok(());
    }
    for model in models {
        let marker = if model.id == ctx.model { "*" } else { " " };
        println!("{} {:<40} {}", marker, model.id, model.owned_by);
    }
    Ok(())
}
