use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["catsync", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["catsync", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["catsync"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn harvest_defaults_to_all_included_categories() {
    let cli = Cli::try_parse_from(["catsync", "harvest"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Harvest {
            ref category,
            dry_run: false
        }) if category.is_empty()
    ));
}

#[test]
fn harvest_accepts_repeated_categories_and_dry_run() {
    let cli = Cli::try_parse_from([
        "catsync",
        "harvest",
        "--category",
        "bebidas",
        "--category",
        "limpeza",
        "--dry-run",
    ])
    .unwrap();
    if let Some(Commands::Harvest { category, dry_run }) = cli.command {
        assert_eq!(category, ["bebidas", "limpeza"]);
        assert!(dry_run);
    } else {
        panic!("unexpected command variant");
    }
}

#[test]
fn parses_snapshot_show_json() {
    let cli = Cli::try_parse_from(["catsync", "snapshot", "show", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Snapshot {
            command: SnapshotCommands::Show { json: true }
        })
    ));
}

#[test]
fn parses_runs_list_default_limit() {
    let cli = Cli::try_parse_from(["catsync", "runs", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List { limit: 20 }
        })
    ));
}

#[test]
fn parses_runs_list_with_limit() {
    let cli = Cli::try_parse_from(["catsync", "runs", "list", "--limit", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Runs {
            command: RunsCommands::List { limit: 5 }
        })
    ));
}

#[test]
fn snapshot_requires_subcommand() {
    assert!(Cli::try_parse_from(["catsync", "snapshot"]).is_err());
}
