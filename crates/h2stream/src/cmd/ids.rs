use std::collections::HashMap;

use h2stream_frame::{ChannelIds, Fnv1Ids};

use crate::cmd::IdsArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_ids, IdRow, OutputFormat};

pub fn run(args: IdsArgs, format: OutputFormat) -> CliResult<i32> {
    let ids = Fnv1Ids;
    let rows = derive_ids(&ids, &args.names);
    print_ids(ids.scheme(), &rows, format);

    if let Some(row) = rows.iter().find(|row| row.id == 0) {
        return Err(CliError::new(
            DATA_INVALID,
            format!("channel {:?} maps to invalid id 0", row.name),
        ));
    }
    if let Some(row) = rows.iter().find(|row| row.collides_with.is_some()) {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "channel {:?} collides with {:?} on id {}",
                row.name,
                row.collides_with.as_deref().unwrap_or_default(),
                row.id
            ),
        ));
    }
    Ok(SUCCESS)
}

/// Derive ids in order. Repeated names are listed once; a row collides with
/// the first earlier name that maps to the same id.
fn derive_ids(ids: &dyn ChannelIds, names: &[String]) -> Vec<IdRow> {
    let mut owners: HashMap<u32, &str> = HashMap::new();
    let mut rows = Vec::with_capacity(names.len());

    for name in names {
        let id = ids.channel_id(name);
        let collides_with = match owners.get(&id) {
            Some(owner) if *owner == name.as_str() => continue,
            Some(owner) => Some((*owner).to_string()),
            None => {
                owners.insert(id, name);
                None
            }
        };
        rows.push(IdRow {
            name: name.clone(),
            id,
            collides_with,
        });
    }
    rows
}
