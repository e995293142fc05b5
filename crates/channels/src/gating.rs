/// Check whether a sender name passes a channel allowlist.
///
/// An empty allowlist admits everyone. Entries match case-insensitively,
/// either exactly or as globs where `*` matches any run of characters.
pub fn sender_allowed(name: &str, allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    let name = name.to_lowercase();
    allowlist.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        if pattern.contains('*') {
            glob_match(&pattern, &name)
        } else {
            pattern == name
        }
    })
}

/// `*`-only glob matching. The first piece anchors at the start, the last at
/// the end, and the pieces in between must appear in order.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    let Some((last, middle)) = pieces.split_last() else {
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| (*e).to_string()).collect()
    }

    #[test]
    fn empty_allowlist_admits_everyone() {
        assert!(sender_allowed("anyone", &[]));
    }

    #[test]
    fn exact_match_ignores_case() {
        let allow = list(&["Alice", "bob"]);
        assert!(sender_allowed("alice", &allow));
        assert!(sender_allowed("BOB", &allow));
        assert!(!sender_allowed("carol", &allow));
    }

    #[test]
    fn prefix_and_suffix_globs() {
        assert!(sender_allowed("mod_alice", &list(&["mod_*"])));
        assert!(!sender_allowed("alice_mod", &list(&["mod_*"])));
        assert!(sender_allowed("alice_vip", &list(&["*_vip"])));
        assert!(!sender_allowed("alice_vip2", &list(&["*_vip"])));
    }

    #[test]
    fn middle_glob_keeps_order() {
        let allow = list(&["team_*_lead"]);
        assert!(sender_allowed("team_red_lead", &allow));
        assert!(!sender_allowed("team_red_member", &allow));
        assert!(sender_allowed("anything", &list(&["*"])));
    }
}
