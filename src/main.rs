#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = gradepoint_rust::run().await {
        eprintln!("gradepoint-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
