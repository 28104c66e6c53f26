//! Editing `swarming trigger` argument lists.
//!
//! Arguments are `<trigger flags> -- <task command>`; anything meant for
//! the trigger goes before the `--`.

use std::collections::BTreeMap;

/// Bot dimensions as `key -> value`, one set per bot config.
pub type BotConfig = BTreeMap<String, String>;

/// Every `--dimension key value` triple.
pub fn swarming_dimensions(args: &[String]) -> BTreeMap<String, String> {
    let mut dimensions = BTreeMap::new();
    for window in args.windows(3) {
        if window[0] == "--dimension" {
            dimensions.insert(window[1].clone(), window[2].clone());
        }
    }
    dimensions
}

/// The host following `--swarming`, without its scheme.
pub fn swarming_server(args: &[String]) -> Option<String> {
    let position = args.iter().position(|arg| arg.contains("--swarming"))?;
    let server = args.get(position + 1)?;
    Some(match server.find("//") {
        Some(index) => server[index + 2..].to_string(),
        None => server.clone(),
    })
}

/// Drop the first `--dimension <name> <value>` triple.
pub fn remove_swarming_dimension(args: &[String], name: &str) -> Vec<String> {
    for i in 0..args.len().saturating_sub(1) {
        if args[i] == "--dimension" && args[i + 1] == name {
            let mut kept = args[..i].to_vec();
            kept.extend(args.iter().skip(i + 3).cloned());
            return kept;
        }
    }
    args.to_vec()
}

/// Insert `extra` before the `--` separator, or append it.
pub fn insert_before_dash(args: &[String], extra: Vec<String>) -> Vec<String> {
    match args.iter().position(|arg| arg == "--") {
        Some(dash) => {
            let mut out = args[..dash].to_vec();
            out.extend(extra);
            out.extend(args[dash..].iter().cloned());
            out
        }
        None => {
            let mut out = args.to_vec();
            out.extend(extra);
            out
        }
    }
}

/// Arguments for triggering one shard on the bot described by `bot_config`.
///
/// Adds `--dump-json`, the gtest sharding environment when there is more
/// than one shard, the bot's dimensions, and a `shard:<i>` tag that later
/// runs use to find the bot this shard last ran on.
pub fn modify_args(
    all_args: &[String],
    bot_config: Option<&BotConfig>,
    shard_index: usize,
    total_shards: usize,
    dump_json: &str,
) -> Vec<String> {
    let mut bot_args = vec!["--dump-json".to_string(), dump_json.to_string()];
    if total_shards > 1 {
        bot_args.push("--env".to_string());
        bot_args.push(format!("GTEST_SHARD_INDEX={}", shard_index));
        bot_args.push("--env".to_string());
        bot_args.push(format!("GTEST_TOTAL_SHARDS={}", total_shards));
    }
    if let Some(config) = bot_config {
        for (key, value) in config {
            bot_args.push("--dimension".to_string());
            bot_args.push(key.clone());
            bot_args.push(value.clone());
        }
    }
    let args = insert_before_dash(all_args, bot_args);
    insert_before_dash(
        &args,
        vec!["--tag".to_string(), format!("shard:{}", shard_index)],
    )
}

/// Split `argv` into the flags this tool owns and everything else, which
/// is passed through to `swarming trigger`. `valued` flags take a value
/// (`--flag v` or `--flag=v`); `switches` take none. Scanning stops at `--`.
pub fn split_known_args(
    argv: &[String],
    valued: &[&str],
    switches: &[&str],
) -> (Vec<String>, Vec<String>) {
    let mut known = Vec::new();
    let mut remaining = Vec::new();
    let mut i = 0;
    while i < argv.len() {
        let arg = &argv[i];
        i += 1;
        if arg == "--" {
            remaining.extend(argv[i - 1..].iter().cloned());
            break;
        }
        let name = arg.split_once('=').map_or(arg.as_str(), |(name, _)| name);
        if switches.contains(&name) {
            known.push(arg.clone());
        } else if valued.contains(&name) {
            known.push(arg.clone());
            if !arg.contains('=') && i < argv.len() {
                known.push(argv[i].clone());
                i += 1;
            }
        } else {
            remaining.push(arg.clone());
        }
    }
    (known, remaining)
}
