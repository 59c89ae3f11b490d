//! Command-line argument parsing.

use fd_protocol::{RecordField, SortSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Version,
    /// One exchange with the agent. `None` means read the prompt from stdin.
    Ask(Option<String>),
    Search(SearchArgs),
}

/// Inventory search flags. `page` is 1-based as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchArgs {
    pub text: Option<String>,
    pub filters: Vec<(RecordField, String)>,
    pub sort: Option<SortSpec>,
    pub page: usize,
    pub size: Option<usize>,
    pub summary: bool,
}

pub fn print_help() {
    println!("fleetdesk: chat with the fleet agent and search the vehicle inventory");
    println!();
    println!("Usage:");
    println!("  fleetdesk                        Interactive chat (on a terminal)");
    println!("  fleetdesk \"question\"             Ask once and print the reply");
    println!("  echo \"question\" | fleetdesk      Ask once, prompt from stdin");
    println!("  fleetdesk --search [filters]     Search the inventory");
    println!();
    println!("Search filters:");
    println!("  --text <s>       Match make, model or location");
    println!("  --make <s>       --model <s>     --location <s>");
    println!("  --category <c>   --status <s>    --zip <code>   --year <n>");
    println!("  --sort <field>   Sort by field (e.g. daily_rate, year, make)");
    println!("  --desc           Sort descending");
    println!("  --page <n>       Page number, from 1");
    println!("  --size <n>       Page size");
    println!("  --summary        Print fleet totals instead of a page");
    println!();
    println!("Chat commands: /clear, /quit");
    println!();
    println!("Options:");
    println!("  --version        Print version");
    println!("  --help           Print this help");
    println!();
    println!("Logging is controlled with RUST_LOG (e.g. RUST_LOG=fd_backend=debug).");
}

pub fn parse_args(args: &[String]) -> Result<Invocation, String> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Invocation::Help);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        return Ok(Invocation::Version);
    }
    if args.iter().any(|a| a == "--search") {
        return parse_search(args.iter().filter(|a| *a != "--search")).map(Invocation::Search);
    }

    let mut positional = Vec::new();
    for arg in args {
        if arg.starts_with("--") {
            return Err(format!("unknown option: {arg}"));
        }
        positional.push(arg.as_str());
    }
    if positional.is_empty() {
        Ok(Invocation::Ask(None))
    } else {
        Ok(Invocation::Ask(Some(positional.join(" "))))
    }
}

fn parse_search<'a>(mut args: impl Iterator<Item = &'a String>) -> Result<SearchArgs, String> {
    let mut search = SearchArgs {
        page: 1,
        ..Default::default()
    };
    let mut sort_field = None;
    let mut descending = false;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--desc" => descending = true,
            "--summary" => search.summary = true,
            _ => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{flag} needs a value"))?
                    .clone();
                match flag.as_str() {
                    "--text" => search.text = Some(value),
                    "--make" => search.filters.push((RecordField::Make, value)),
                    "--model" => search.filters.push((RecordField::Model, value)),
                    "--location" => search.filters.push((RecordField::Location, value)),
                    "--category" => search.filters.push((RecordField::Category, value)),
                    "--status" => search.filters.push((RecordField::Status, value)),
                    "--zip" => search.filters.push((RecordField::ZipCode, value)),
                    "--year" => search.filters.push((RecordField::Year, value)),
                    "--sort" => sort_field = Some(value.parse::<RecordField>()?),
                    "--page" => {
                        search.page = parse_count(flag, &value)?;
                    }
                    "--size" => search.size = Some(parse_count(flag, &value)?),
                    _ => return Err(format!("unknown search option: {flag}")),
                }
            }
        }
    }

    search.sort = match (sort_field, descending) {
        (Some(field), descending) => Some(SortSpec { field, descending }),
        (None, true) => return Err("--desc needs --sort".to_string()),
        (None, false) => None,
    };
    Ok(search)
}

fn parse_count(flag: &str, value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{flag} expects a positive number, got '{value}'")),
    }
}
