use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabixr::{
    Config,
    bgzf::{BlockReader, Writer},
    config::{BgzipArgs, Command, QueryArgs, ServeArgs},
    handlers::{AppState, create_router},
    storage::LocalStorage,
    tabix::TabixFile,
    types::Region,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr so query output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match config.command {
        Command::Query(args) => tokio::task::spawn_blocking(move || query(args)).await?,
        Command::Inspect { path } => tokio::task::spawn_blocking(move || inspect(path)).await?,
        Command::Bgzip(args) => tokio::task::spawn_blocking(move || bgzip(args)).await?,
        Command::Serve(args) => serve(args).await,
    }
}

fn query(args: QueryArgs) -> anyhow::Result<()> {
    let file = TabixFile::open(&args.path)
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    let mut out = BufWriter::new(io::stdout().lock());

    if args.list_chroms {
        for name in file.sequence_names() {
            writeln!(out, "{name}")?;
        }
        return Ok(out.flush()?);
    }

    for region in &args.regions {
        let region = Region::parse_in(region, file.sequence_names())?;
        let records = file.query(
            &region.reference_name,
            region.start_or_min(),
            region.end_or_max(),
        )?;
        for line in records {
            writeln!(out, "{}", line?)?;
        }
    }

    file.close();
    Ok(out.flush()?)
}

fn inspect(path: std::path::PathBuf) -> anyhow::Result<()> {
    let input = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BlockReader::new(BufReader::new(input));
    let mut out = BufWriter::new(io::stdout().lock());

    writeln!(out, "coffset\tcsize\tusize")?;
    let (mut blocks, mut total) = (0usize, 0u64);
    while let Some(block) = reader.next_block()? {
        writeln!(out, "{}\t{}\t{}", block.coffset(), block.csize(), block.len())?;
        blocks += 1;
        total += block.len() as u64;
    }

    writeln!(
        out,
        "# {blocks} blocks, {total} bytes uncompressed, EOF marker {}",
        if reader.saw_eof_marker() { "present" } else { "missing" }
    )?;
    Ok(out.flush()?)
}

fn bgzip(args: BgzipArgs) -> anyhow::Result<()> {
    let output = args.output_path();
    let mut input = BufReader::new(
        File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?,
    );
    let mut writer = Writer::new(
        File::create(&output).with_context(|| format!("failed to create {}", output.display()))?,
    )
    .with_block_size(args.block_size)
    .with_compression_level(args.level);

    io::copy(&mut input, &mut writer)?;
    writer.finish()?;

    tracing::info!(input = %args.input.display(), output = %output.display(), "compressed");
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let storage = Arc::new(LocalStorage::new(args.data_dir.clone()));
    let state = AppState::new(storage);
    let registry = Arc::clone(&state.registry);

    let app = create_router(state);
    let app = if args.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = args.bind_address();
    tracing::info!("Starting tabixr server on {}", addr);
    tracing::info!("Data directory: {:?}", args.data_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    registry.close_all();
    Ok(())
}
