//! Command execution against an open tree.

use std::io::{self, Write};

use serde_json::Value as JsonValue;

use metatree::{Metadata, Query, Tree};

use crate::{Cli, CliError, Command};

/// Open the root named on the command line and run its command.
pub fn execute(cli: &Cli, out: &mut dyn Write) -> Result<(), CliError> {
    let tree = Tree::open(&cli.root, cli.options())?;

    match &cli.command {
        Command::Init => {
            writeln!(out, "{} {}", tree.root_path(), tree.schema())?;
        }
        Command::Put { query, source } => {
            let node = tree.put(parse_query(&tree, query)?, source)?;
            writeln!(out, "{}", node.path())?;
        }
        Command::Get { path, output } => match output {
            Some(destination) => {
                let written = tree.get_to(path, destination)?;
                writeln!(out, "{}", written.display())?;
            }
            None => {
                for chunk in tree.get(path)? {
                    out.write_all(&chunk.map_err(metatree::Error::from)?)?;
                }
                out.flush()?;
            }
        },
        Command::Ls { query } => {
            let node = tree.search(parse_optional_query(&tree, query.as_deref())?)?;
            for name in node.list()? {
                writeln!(out, "{}", name)?;
            }
        }
        Command::Meta { query } => {
            let node = tree.search(parse_optional_query(&tree, query.as_deref())?)?;
            print_metadata(out, &node.metadata()?)?;
        }
        Command::Update { query, fields } => {
            let fields = fields
                .iter()
                .map(|field| parse_field(field))
                .collect::<Result<Vec<_>, _>>()?;
            let node = tree.search(parse_query(&tree, query)?)?;
            print_metadata(out, &node.update(fields)?)?;
        }
    }

    Ok(())
}

/// Path notation, or structured JSON notation when the text starts with `{`.
fn parse_query(tree: &Tree, text: &str) -> Result<Query, CliError> {
    if text.trim_start().starts_with('{') {
        let value: JsonValue = serde_json::from_str(text)?;
        Ok(Query::from_json(&value)?)
    } else {
        Ok(Query::parse(text, tree.schema())?)
    }
}

fn parse_optional_query(tree: &Tree, text: Option<&str>) -> Result<Query, CliError> {
    match text {
        Some(text) => parse_query(tree, text),
        None => Ok(Query::new()),
    }
}

fn parse_field(field: &str) -> Result<(String, String), CliError> {
    match field.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidField {
            field: field.to_string(),
        }),
    }
}

fn print_metadata(out: &mut dyn Write, metadata: &Metadata) -> io::Result<()> {
    let rendered = serde_json::to_string_pretty(metadata.as_document())?;
    writeln!(out, "{}", rendered)
}
