use clap::{Parser, Subcommand};
use post_render::cms::{self, ContentSource};
use post_render::config::{self, SiteConfig};
use post_render::pages::PageStore;
use post_render::{generate, output, server, telemetry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "post-render")]
#[command(about = "Render CMS-backed blog post pages")]
#[command(long_about = "\
Render CMS-backed blog post pages

Posts are fetched from a Prismic-style content API (cms.endpoint in
config.toml) or, with --documents, from a directory of <uid>.json files.
Each page shows the banner, title, publication date, author, an estimated
reading time and the post's content sections.

Static generation:

  build   pre-generates the first cms.paths_page_size posts into the
          output directory, plus fallback.html and 404.html. Pages built
          less than generation.revalidate_secs ago are kept as they are.
  serve   serves /post/{slug}; unknown posts get the fallback placeholder
          while they are generated, stale posts are regenerated in the
          background.

Run 'post-render gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Read documents from this directory instead of the configured endpoint
    #[arg(long, global = true)]
    documents: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Output directory
    #[arg(long, default_value = "dist")]
    output: PathBuf,

    /// Ignore the build manifest and regenerate every page
    #[arg(long)]
    no_cache: bool,
}

#[derive(clap::Args, Clone)]
struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Pre-generate static pages into the output directory
    Build(BuildArgs),
    /// Serve pages with on-demand generation and revalidation
    Serve(ServeArgs),
    /// Render a single post to stdout
    Render {
        /// Post slug (document uid)
        slug: String,
    },
    /// Fetch the static paths and report content problems without building
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Load config, install logging and open the content source.
fn setup(
    config_path: &Path,
    documents: Option<&Path>,
) -> Result<(SiteConfig, Arc<dyn ContentSource>), Box<dyn std::error::Error>> {
    let site_config = config::load_config(config_path)?;
    telemetry::init(&site_config.logging)?;
    let source = cms::open_source(&site_config.cms, documents)?;
    Ok((site_config, source))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let documents = cli.documents.as_deref();

    match cli.command {
        Command::Build(args) => {
            let (site_config, source) = setup(&cli.config, documents)?;
            println!("==> Generating pages \u{2192} {}", args.output.display());
            let report =
                generate::generate(source, &site_config, &args.output, !args.no_cache).await?;
            output::print_generate_output(&report);
            println!("==> Build complete: {}", args.output.display());
        }
        Command::Serve(args) => {
            let (site_config, source) = setup(&cli.config, documents)?;
            let store = Arc::new(PageStore::new(source, &site_config)?);
            store.prerender().await?;
            let bind = args.bind.unwrap_or(site_config.server.bind);
            server::serve(store, &bind).await?;
        }
        Command::Render { slug } => {
            let (site_config, source) = setup(&cli.config, documents)?;
            let store = PageStore::new(source, &site_config)?;
            let html = store.generate(&slug).await?;
            println!("{}", html);
        }
        Command::Check => {
            let (site_config, source) = setup(&cli.config, documents)?;
            let report = generate::check(source.as_ref(), &site_config).await?;
            output::print_check_output(&report);
            let problems = report.problem_count();
            if problems > 0 {
                return Err(format!("{} content problem(s) found", problems).into());
            }
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
