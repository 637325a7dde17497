use anyhow::Context;
use devevent_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load DevEvent settings")?;
    devevent_app::bootstrap::run(settings).await
}
