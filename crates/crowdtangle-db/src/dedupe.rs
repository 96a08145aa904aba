//! Account deduplication.
//!
//! Several posts in one batch can be authored by the same account, each
//! carrying the account as it looked when that post was fetched. Only the
//! most recently updated snapshot should reach the `accounts` upsert; besides
//! being the freshest data, Postgres refuses an `ON CONFLICT DO UPDATE` that
//! touches the same row twice in one statement.

use std::collections::HashMap;

use crowdtangle_types::{Account, AccountId, EncapsulatedPost};

/// Reduce `accounts` to one record per id, keeping the one with the latest
/// `updated` timestamp.
///
/// Runs in a single pass. When two records share an id and an identical
/// `updated`, the one encountered later wins. Output is ordered by the
/// position at which each id was first seen.
pub fn dedupe_accounts_by_latest_update<'a, I>(accounts: I) -> Vec<Account>
where
    I: IntoIterator<Item = &'a Account>,
{
    let mut slot_by_id: HashMap<AccountId, usize> = HashMap::new();
    let mut latest: Vec<Account> = Vec::new();

    for account in accounts {
        if let Some(best) = slot_by_id
            .get(&account.id)
            .and_then(|&slot| latest.get_mut(slot))
        {
            if account.updated >= best.updated {
                best.clone_from(account);
            }
        } else {
            slot_by_id.insert(account.id, latest.len());
            latest.push(account.clone());
        }
    }

    latest
}

/// Flatten the accounts of a batch and keep the latest snapshot of each.
pub fn latest_accounts(batch: &[EncapsulatedPost]) -> Vec<Account> {
    dedupe_accounts_by_latest_update(batch.iter().map(|record| &record.account))
}
