// CLI entry point for tidewater.
//
// Thin glue over the two library crates: loads a JSON tool config, loads the
// index files it names, and either answers a tile query, generates a water
// web, or summarizes a saved graph. All real work happens in
// `tidewater_index` and `tidewater_nav`.
//
// Usage:
//   tidewater [--config <PATH>] <COMMAND>
//     query <X> <Y> <PLANE>            Pathability, tile class and objects
//     web <X> <Y> <PLANE> [OPTIONS]    Generate a water web from a seed
//       --spacing <N>                  Node spacing (default from config)
//       --buffer <N>                   Collision buffer (default from config)
//       --out <PATH>                   Output file (default from config)
//     graph-info <PATH>                Node/edge counts and class histogram
//
// Logging goes through `env_logger`; set RUST_LOG=debug for phase changes.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use tidewater_index::collision::{CollisionIndex, CollisionQuery};
use tidewater_index::config::IndexConfig;
use tidewater_index::objects::ObjectIndex;
use tidewater_index::tile_class::{TileClassIndex, TileClassQuery, surface};
use tidewater_index::{DirectionFlags, TileCoord};
use tidewater_nav::builder::spawn_generate;
use tidewater_nav::codec::{load_graph, save_graph};
use tidewater_nav::{BuilderConfig, NavGraph};

/// Everything the tool reads from `--config`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ToolConfig {
    index: IndexConfig,
    builder: BuilderConfig,
}

impl ToolConfig {
    fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Command {
    Query(TileCoord),
    Web {
        seed: TileCoord,
        spacing: Option<i32>,
        buffer: Option<i32>,
        out: Option<PathBuf>,
    },
    GraphInfo(PathBuf),
    Help,
}

#[derive(Clone, Debug, PartialEq)]
struct Cli {
    config: Option<PathBuf>,
    command: Command,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.command == Command::Help {
        print_usage();
        return Ok(());
    }
    let config = match &cli.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };

    match cli.command {
        Command::Query(coord) => query(&config, coord),
        Command::Web {
            seed,
            spacing,
            buffer,
            out,
        } => {
            let mut builder = config.builder.clone();
            if let Some(spacing) = spacing {
                builder.node_spacing = spacing;
            }
            if let Some(buffer) = buffer {
                builder.collision_buffer = buffer;
            }
            let out = out.unwrap_or_else(|| config.index.graph_path());
            web(&config.index, builder, seed, &out)
        }
        Command::GraphInfo(path) => graph_info(&path),
        Command::Help => Ok(()),
    }
}

fn load_indexes(index: &IndexConfig) -> Result<(CollisionIndex, TileClassIndex), Box<dyn Error>> {
    let collision = CollisionIndex::load(&index.collision_path(), index.collision_codec()?)?;
    let classes = TileClassIndex::load(&index.tile_class_path(), index.tile_class_codec()?)?;
    Ok((collision, classes))
}

fn query(config: &ToolConfig, at: TileCoord) -> Result<(), Box<dyn Error>> {
    let (collision, classes) = load_indexes(&config.index)?;
    let (x, y, plane) = (at.x, at.y, at.plane);

    println!("Tile {at}");
    println!(
        "  pathable: N={} E={} S={} W={}",
        collision.pathable_north(x, y, plane),
        collision.pathable_east(x, y, plane),
        collision.pathable_south(x, y, plane),
        collision.pathable_west(x, y, plane)
    );
    println!("  blocked:  {}", collision.is_blocked(x, y, plane));
    println!("  flags:    {}", describe_flags(collision.all(x, y, plane)));

    let class = classes.tile_class(x, y, plane);
    println!(
        "  class:    {class} ({})",
        surface::name(class).unwrap_or("unknown")
    );

    let objects_path = config.index.objects_path();
    if objects_path.exists() {
        let objects = ObjectIndex::load(&objects_path)?;
        println!("  objects:  {:?}", objects.objects_at(x, y, plane));
    } else {
        warn!("no object index at {}", objects_path.display());
    }
    Ok(())
}

fn describe_flags(flags: DirectionFlags) -> String {
    let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() {
        "none".into()
    } else {
        format!("{:#04x} {}", flags.bits(), names.join(" "))
    }
}

fn web(
    index: &IndexConfig,
    builder: BuilderConfig,
    seed: TileCoord,
    out: &Path,
) -> Result<(), Box<dyn Error>> {
    let (collision, classes) = load_indexes(index)?;
    let handle = spawn_generate(Arc::new(collision), Arc::new(classes), seed, builder, |p| {
        println!("[{:>3}%] {}: {}", p.percent, p.phase, p.detail);
    })?;
    let graph = handle.join()?;
    if let Some(dir) = out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    save_graph(&graph, out)?;
    println!(
        "Saved {} nodes, {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        out.display()
    );
    Ok(())
}

fn graph_info(path: &Path) -> Result<(), Box<dyn Error>> {
    let graph = load_graph(path)?;
    println!("{}", path.display());
    println!("  nodes: {}", graph.node_count());
    println!("  edges: {}", graph.edge_count());
    for (class, count) in class_histogram(&graph).into_iter().enumerate() {
        if count == 0 {
            continue;
        }
        let class = class as u8 + 1;
        println!(
            "  class {class:>2} {:<16} {count} edges",
            surface::name(class).unwrap_or("unknown")
        );
    }
    Ok(())
}

/// Edge count per tile class; index 0 is class 1.
fn class_histogram(graph: &NavGraph) -> [usize; 16] {
    let mut counts = [0usize; 16];
    for edge in graph.edges() {
        for class in edge.tile_classes.classes() {
            counts[usize::from(class) - 1] += 1;
        }
    }
    counts
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut config = None;
    let mut positional: Vec<&str> = Vec::new();
    let mut spacing = None;
    let mut buffer = None;
    let mut out = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config = Some(PathBuf::from(value(args, i, "--config")?));
            }
            "--spacing" => {
                i += 1;
                spacing = Some(number(value(args, i, "--spacing")?, "--spacing")?);
            }
            "--buffer" => {
                i += 1;
                buffer = Some(number(value(args, i, "--buffer")?, "--buffer")?);
            }
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(value(args, i, "--out")?));
            }
            "--help" | "-h" => {
                return Ok(Cli {
                    config,
                    command: Command::Help,
                });
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown argument: {flag}")),
            other => positional.push(other),
        }
        i += 1;
    }

    let Some((&name, rest)) = positional.split_first() else {
        return Err("Missing command".into());
    };
    let command = match name {
        "query" => Command::Query(coord(rest)?),
        "web" => Command::Web {
            seed: coord(rest)?,
            spacing,
            buffer,
            out,
        },
        "graph-info" => match rest {
            [path] => Command::GraphInfo(PathBuf::from(path)),
            _ => return Err("graph-info takes exactly one path".into()),
        },
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(Cli { config, command })
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn number(text: &str, what: &str) -> Result<i32, String> {
    text.parse()
        .map_err(|_| format!("{what} requires a valid number, got {text:?}"))
}

fn coord(rest: &[&str]) -> Result<TileCoord, String> {
    match rest {
        [x, y, plane] => Ok(TileCoord::new(
            number(x, "x")?,
            number(y, "y")?,
            number(plane, "plane")?,
        )),
        _ => Err("expected <X> <Y> <PLANE>".into()),
    }
}

fn print_usage() {
    println!("Usage: tidewater [--config <PATH>] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  query <X> <Y> <PLANE>            Pathability, tile class and objects at a tile");
    println!("  web <X> <Y> <PLANE> [OPTIONS]    Generate a water web from a seed tile");
    println!("      --spacing <N>                Node spacing (default from config)");
    println!("      --buffer <N>                 Collision buffer (default from config)");
    println!("      --out <PATH>                 Output file (default from config)");
    println!("  graph-info <PATH>                Node/edge counts and tile class histogram");
    println!();
    println!("Options:");
    println!("  --config <PATH>                  JSON config with \"index\" and \"builder\" sections");
    println!("  --help, -h                       Show this help");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_nav::TileClassMask;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_query() {
        let cli = parse_args(&args(&["query", "3200", "3201", "0"])).unwrap();
        assert_eq!(cli.command, Command::Query(TileCoord::new(3200, 3201, 0)));
        assert_eq!(cli.config, None);
    }

    #[test]
    fn parses_web_with_options_anywhere() {
        let cli = parse_args(&args(&[
            "--config", "tw.json", "web", "--spacing", "30", "3000", "3100", "0", "--out",
            "out/web.gweb",
        ]))
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tw.json")));
        assert_eq!(
            cli.command,
            Command::Web {
                seed: TileCoord::new(3000, 3100, 0),
                spacing: Some(30),
                buffer: None,
                out: Some(PathBuf::from("out/web.gweb")),
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["query", "1", "2"])).is_err());
        assert!(parse_args(&args(&["query", "1", "two", "0"])).is_err());
        assert!(parse_args(&args(&["web", "1", "2", "0", "--buffer"])).is_err());
        assert!(parse_args(&args(&["graph-info"])).is_err());
        assert!(parse_args(&args(&["teleport"])).is_err());
        assert!(parse_args(&args(&["--verbose", "query", "1", "2", "0"])).is_err());
    }

    #[test]
    fn help_wins() {
        let cli = parse_args(&args(&["query", "--help"])).unwrap();
        assert_eq!(cli.command, Command::Help);
    }

    #[test]
    fn tool_config_sections_default_independently() {
        let config: ToolConfig =
            serde_json::from_str(r#"{ "builder": { "node_spacing": 25 } }"#).unwrap();
        assert_eq!(config.builder.node_spacing, 25);
        assert_eq!(config.builder.collision_buffer, 5);
        assert_eq!(config.index, IndexConfig::default());
    }

    #[test]
    fn histogram_counts_each_class_once_per_edge() {
        let mut graph = NavGraph::new();
        let a = graph.add_node(TileCoord::new(0, 0, 0)).unwrap().key;
        let b = graph.add_node(TileCoord::new(10, 0, 0)).unwrap().key;
        let c = graph.add_node(TileCoord::new(20, 0, 0)).unwrap().key;
        graph.add_edge(a, b, TileClassMask::from_classes([1, 5])).unwrap();
        graph.add_edge(b, c, TileClassMask::from_classes([1])).unwrap();
        let counts = class_histogram(&graph);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[4], 1);
        assert_eq!(counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn flags_are_named() {
        assert_eq!(describe_flags(DirectionFlags::empty()), "none");
        let text = describe_flags(DirectionFlags::NORTH | DirectionFlags::EAST);
        assert_eq!(text, "0x12 NORTH EAST");
    }
}
