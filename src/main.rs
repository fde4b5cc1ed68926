use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = traceability::cli::Cli::parse();
    if let Err(e) = traceability::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
