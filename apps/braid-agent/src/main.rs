use clap::Parser;

use braid_agent::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	let args = Args::parse();

	braid_agent::run(args).await
}
