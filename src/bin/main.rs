use dotenv::dotenv;

use clap::ArgMatches;

use realworld_articles::{app::*, db::DbService, error::*};

fn required<'a>(args: Option<&'a ArgMatches>, name: &str) -> Result<&'a str> {
  args.and_then(|args| args.value_of(name))
    .ok_or_else(|| Error::BadRequest(format!("missing argument: {}", name)))
}

async fn run(cli: &ArgMatches<'_>, config: &AppConfig) -> Result<()> {
  let db = DbService::new(config)?;
  db.prepare().await?;

  match cli.subcommand() {
    ("migrate", _) => migrate::execute(&db).await?,
    ("recount", args) => {
      db.require_persistent("recount")?;
      let count = recount::execute(&db, required(args, "slug")?).await?;
      println!("{}", count);
    },
    ("show", args) => {
      db.require_persistent("show")?;
      let viewer = args.and_then(|args| args.value_of("viewer"));
      println!("{}", show::execute(&db, required(args, "slug")?, viewer).await?);
    },
    (name, _) => {
      log::warn!("Unknown command: {:?}", name);
      println!("{}", cli.usage());
    },
  }
  Ok(())
}

fn main() -> Result<()> {
  dotenv().ok();
  env_logger::init();

  let yaml = clap::load_yaml!("main-cli.yml");
  let cli = clap::App::from_yaml(yaml).get_matches();

  let config = AppConfig::new_clap(&cli)?;

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(&cli, &config))?;
  log::info!("Main finished");
  Ok(())
}
