use shared::domain::{AllocationRecord, AllocationStatus, StatusFilter, VoteStats};

/// Counts by status and saboteur flag over the current list.
pub fn stats(allocations: &[AllocationRecord]) -> VoteStats {
    let mut out = VoteStats {
        total: allocations.len(),
        ..VoteStats::default()
    };
    for record in allocations {
        match record.status {
            AllocationStatus::Pending => out.pending += 1,
            AllocationStatus::Approved => out.approved += 1,
            AllocationStatus::Rejected => out.rejected += 1,
        }
        if record.is_saboteur {
            out.saboteurs += 1;
        }
    }
    out
}

/// Records submitted by `address`, compared case-insensitively, keeping
/// list order.
pub fn history_for(allocations: &[AllocationRecord], address: &str) -> Vec<AllocationRecord> {
    allocations
        .iter()
        .filter(|record| record.voter.eq_ignore_ascii_case(address))
        .cloned()
        .collect()
}

/// Combined search and status filter: case-insensitive substring match on id
/// or voter, AND an exact status match (or the `All` wildcard). An empty
/// search term matches everything.
pub fn filtered(
    allocations: &[AllocationRecord],
    search_term: &str,
    filter: StatusFilter,
) -> Vec<AllocationRecord> {
    let needle = search_term.to_lowercase();
    allocations
        .iter()
        .filter(|record| {
            let matches_search = record.id.as_str().to_lowercase().contains(&needle)
                || record.voter.to_lowercase().contains(&needle);
            matches_search && filter.matches(record.status)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
