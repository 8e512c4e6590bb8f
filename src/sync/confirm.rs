use std::time::Duration;

use crate::platform::ConfirmationPrompt;
use crate::{MemberId, Rule};

use super::diff::TargetDiff;

/// Members shown as examples on each side of a diff.
const EXAMPLES: usize = 4;

fn member_mention(id: MemberId) -> String {
    format!("<@{id}>")
}

/// "a", "a and b", "a, b and c".
pub(crate) fn join_list<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut items: Vec<String> = items.into_iter().collect();
    match items.len() {
        0 => String::new(),
        1 => items.remove(0),
        _ => {
            let last = items.pop().unwrap_or_default();
            format!("{} and {last}", items.join(", "))
        }
    }
}

fn examples(members: &std::collections::BTreeSet<MemberId>) -> String {
    join_list(members.iter().take(EXAMPLES).copied().map(member_mention))
}

/// Rough duration of applying `total` mutations, in seconds.
fn estimate_secs(total: usize) -> u64 {
    (total / 5 * 5) as u64 * 3 / 2
}

fn push_field(fields: &mut Vec<(String, String)>, name: &str, value: String) {
    if !value.is_empty() {
        fields.push((name.to_owned(), value));
    }
}

/// Prompt for setting (`Some`) or deleting (`None`) the rule of one target.
pub(crate) fn rule_prompt(
    diff: &TargetDiff,
    rule: Option<&Rule>,
    timeout: Duration,
) -> ConfirmationPrompt {
    let kind = if diff.target.is_role() {
        "role"
    } else {
        "permissions"
    };

    let mut fields = Vec::new();
    push_field(&mut fields, "Target", diff.target.mention());
    push_field(
        &mut fields,
        "Rule",
        rule.map_or_else(|| "Deleting".to_owned(), Rule::render_with_mentions),
    );
    push_field(&mut fields, "Added", diff.to_add.len().to_string());
    push_field(&mut fields, "Removed", diff.to_remove.len().to_string());
    push_field(&mut fields, "Example added", examples(&diff.to_add));
    push_field(&mut fields, "Example removed", examples(&diff.to_remove));

    ConfirmationPrompt {
        title: format!("Automatic {kind} confirmation"),
        description: format!(
            "Please make sure this is what you want. It will take about {} sec.",
            estimate_secs(diff.total())
        ),
        fields,
        timeout,
    }
}

/// Prompt for re-applying every rule at once.
pub(crate) fn fix_prompt(diffs: &[TargetDiff], timeout: Duration) -> ConfirmationPrompt {
    let added: usize = diffs.iter().map(|d| d.to_add.len()).sum();
    let removed: usize = diffs.iter().map(|d| d.to_remove.len()).sum();

    let mut fields = Vec::new();
    push_field(&mut fields, "Added", added.to_string());
    push_field(&mut fields, "Removed", removed.to_string());
    push_field(
        &mut fields,
        "Rules fixed",
        join_list(diffs.iter().map(|d| d.target.mention())),
    );

    ConfirmationPrompt {
        title: "Fixing automatic rules".to_owned(),
        description: format!(
            "It will take about {} sec.",
            estimate_secs(added + removed)
        ),
        fields,
        timeout,
    }
}
