//! Shard to bot assignment.
//!
//! Perf results are only comparable run over run when a shard keeps landing
//! on the same device, so a shard goes back to the bot it last ran on
//! whenever that bot is still around. Shards without a usable previous bot
//! take an unclaimed healthy bot, then an unclaimed dead one. A final pass
//! moves shards off dead bots while healthy bots remain.

use crate::error::TriggerError;
use crate::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};
use tracing::info;

/// A bot eligible to run the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bot {
    pub id: String,
    pub alive: bool,
}

impl Bot {
    pub fn new(id: impl Into<String>, alive: bool) -> Self {
        Bot {
            id: id.into(),
            alive,
        }
    }
}

/// Assign every shard in `previous` (shard index, bot it last ran on) to a
/// distinct bot from `eligible`.
pub fn assign_with_soft_affinity(
    eligible: &[Bot],
    previous: &[(usize, Option<String>)],
) -> Result<Vec<(usize, Bot)>> {
    if previous.len() > eligible.len() {
        return Err(TriggerError::NotEnoughBots {
            shards: previous.len(),
            bots: eligible.len(),
        });
    }

    let mut unallocated = eligible.to_vec();
    let mut assignment: BTreeMap<usize, Option<Bot>> = BTreeMap::new();
    for (shard, last_bot) in previous {
        let position = last_bot
            .as_ref()
            .and_then(|id| unallocated.iter().position(|bot| &bot.id == id));
        assignment.insert(*shard, position.map(|p| unallocated.remove(p)));
    }
    let existing = assignment.clone();

    let (mut healthy, mut dead): (VecDeque<Bot>, VecDeque<Bot>) =
        unallocated.into_iter().partition(|bot| bot.alive);

    for (shard, bot) in assignment.iter_mut() {
        if bot.is_some() {
            continue;
        }
        if let Some(next) = healthy.pop_front() {
            info!("First time shard {} has been triggered", shard);
            *bot = Some(next);
        } else {
            *bot = dead.pop_front();
        }
    }

    let mut selected = Vec::with_capacity(assignment.len());
    for (shard, bot) in assignment {
        let Some(mut bot) = bot else {
            return Err(TriggerError::NotEnoughBots {
                shards: previous.len(),
                bots: eligible.len(),
            });
        };
        if !bot.alive {
            if let Some(next) = healthy.pop_front() {
                info!(
                    "Device affinity broken for shard #{}. bot {} is dead, new mapping to bot {}",
                    shard, bot.id, next.id
                );
                bot = next;
            }
        }
        selected.push((shard, bot));
    }

    log_affinity(&selected, &existing, eligible);
    Ok(selected)
}

/// Spread shards over every alive bot in random order, ignoring history.
/// There are as many shards as alive bots.
pub fn assign_dynamic_shards<R: Rng + ?Sized>(
    eligible: &[Bot],
    rng: &mut R,
) -> Vec<(usize, Bot)> {
    let alive: Vec<&Bot> = eligible.iter().filter(|bot| bot.alive).collect();
    let mut indexes: Vec<usize> = (0..alive.len()).collect();
    indexes.shuffle(rng);

    let mut selected: Vec<(usize, Bot)> = indexes
        .into_iter()
        .zip(alive)
        .map(|(shard, bot)| (shard, bot.clone()))
        .collect();
    selected.sort_by_key(|(shard, _)| *shard);
    for (shard, bot) in &selected {
        info!("Shard {}\n\tBot: {}", shard, bot.id);
    }
    selected
}

fn log_affinity(
    selected: &[(usize, Bot)],
    existing: &BTreeMap<usize, Option<Bot>>,
    eligible: &[Bot],
) {
    for (shard, bot) in selected {
        let previous = existing
            .get(shard)
            .and_then(|bot| bot.as_ref())
            .map(|bot| bot.id.as_str())
            .unwrap_or("");
        info!("Shard {}\n\tprevious: {}\n\tnew: {}", shard, previous, bot.id);
    }
    let (healthy, dead): (Vec<&Bot>, Vec<&Bot>) = eligible.iter().partition(|bot| bot.alive);
    let ids = |bots: &[&Bot]| bots.iter().map(|bot| bot.id.clone()).collect::<Vec<_>>();
    info!("Shards needed: {}", selected.len());
    info!("Total bots (dead + healthy): {}", eligible.len());
    info!("Healthy bots, {}: {:?}", healthy.len(), ids(&healthy));
    info!("Dead Bots, {}: {:?}", dead.len(), ids(&dead));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bots(alive: &[&str], dead: &[&str]) -> Vec<Bot> {
        alive
            .iter()
            .map(|id| Bot::new(*id, true))
            .chain(dead.iter().map(|id| Bot::new(*id, false)))
            .collect()
    }

    fn history(ids: &[&str]) -> Vec<(usize, Option<String>)> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (i, (!id.is_empty()).then(|| id.to_string())))
            .collect()
    }

    fn ids(selected: &[(usize, Bot)]) -> Vec<&str> {
        selected.iter().map(|(_, bot)| bot.id.as_str()).collect()
    }

    #[test]
    fn test_mixed_fleet_scenario() {
        let eligible = vec![
            Bot::new("A", true),
            Bot::new("B", true),
            Bot::new("C", false),
            Bot::new("D", true),
        ];
        let selected = assign_with_soft_affinity(&eligible, &history(&["A", "C", "X"])).unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].1.id, "A");
        assert!(selected.iter().all(|(_, bot)| bot.alive));
        let mut assigned = ids(&selected);
        assigned.sort();
        assert_eq!(assigned, vec!["A", "B", "D"]);
    }

    #[test]
    fn test_dead_bot_kept_without_healthy_spare() {
        let eligible = bots(&["build3", "build4", "build5"], &["build1", "build2"]);
        let selected = assign_with_soft_affinity(
            &eligible,
            &history(&["build1", "build2", "build3", "build4", "build5"]),
        )
        .unwrap();
        assert_eq!(
            ids(&selected),
            vec!["build1", "build2", "build3", "build4", "build5"]
        );
    }

    #[test]
    fn test_too_many_shards() {
        let err = assign_with_soft_affinity(&[], &history(&["build1"])).unwrap_err();
        assert!(err
            .to_string()
            .contains("Not enough available machines exist in swarming pool"));
    }

    #[test]
    fn test_dynamic_shards_use_alive_bots_only() {
        let eligible = bots(&["build2", "build5", "build3"], &["build1", "build4"]);
        let mut rng = StdRng::seed_from_u64(7);
        let selected = assign_dynamic_shards(&eligible, &mut rng);
        let shards: Vec<usize> = selected.iter().map(|(shard, _)| *shard).collect();
        assert_eq!(shards, vec![0, 1, 2]);
        let mut assigned = ids(&selected);
        assigned.sort();
        assert_eq!(assigned, vec!["build2", "build3", "build5"]);
    }
}
