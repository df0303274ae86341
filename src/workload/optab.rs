//! Operation mix table
//!
//! A fixed 100-slot bucket table maps a uniform draw mod 100 to an
//! operation kind. The table starts out all-GET and configured
//! percentages overwrite consecutive runs of slots, so the free
//! percentage is always GETs. Percentages summing past 100 silently
//! lose the later-enumerated kinds.

use crate::config::LoadConfig;

/// The request kinds the generator can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Idle,
    Get,
    Set,
    Del,
    SwapIn,
    LPush,
    LPop,
    HSet,
    HGet,
    HGetAll,
}

/// 100-slot operation bucket table.
pub struct OpTable {
    slots: [OpKind; 100],
}

impl OpTable {
    /// Build the table from the configured percentages. In idle mode
    /// every slot is IDLE and nothing is ever sent.
    pub fn from_config(cfg: &LoadConfig) -> Self {
        if cfg.idle {
            return Self {
                slots: [OpKind::Idle; 100],
            };
        }

        let mut slots = [OpKind::Get; 100];
        let mut next = 0usize;
        let mut fill = |op: OpKind, perc: u32| {
            for _ in 0..perc {
                if next < 100 {
                    slots[next] = op;
                    next += 1;
                }
            }
        };

        fill(OpKind::Set, cfg.set_perc);
        fill(OpKind::Del, cfg.del_perc);
        fill(OpKind::LPush, cfg.lpush_perc);
        fill(OpKind::LPop, cfg.lpop_perc);
        fill(OpKind::HSet, cfg.hset_perc);
        fill(OpKind::HGet, cfg.hget_perc);
        fill(OpKind::HGetAll, cfg.hgetall_perc);
        fill(OpKind::SwapIn, cfg.swapin_perc);

        Self { slots }
    }

    /// Sample one operation kind.
    pub fn pick(&self, rng: &mut fastrand::Rng) -> OpKind {
        self.slots[(rng.u64(..) % 100) as usize]
    }

    #[cfg(test)]
    fn count(&self, op: OpKind) -> usize {
        self.slots.iter().filter(|&&s| s == op).count()
    }
}
