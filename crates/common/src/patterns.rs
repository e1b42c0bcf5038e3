//! Pattern learning over stored scripts
//!
//! Everything here is a pure function of the scripts it is handed, usually
//! the output of [`crate::store::ScriptStore::load_all`]. Nothing is cached
//! between calls.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::types::{ActionKind, TestScript};

const MAX_EXAMPLES: usize = 5;
const SIMILARITY_THRESHOLD: f64 = 0.1;
const MIN_WORKFLOW_STEPS: usize = 3;

/// An action-kind sequence seen across several scripts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    /// Kinds joined by ` -> `
    pub pattern: String,
    pub count: usize,
    /// Up to five script names exhibiting the pattern
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStep {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub description: String,
}

/// A multi-step script ranked against a free-text description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub similarity: f64,
    pub steps: Vec<WorkflowStep>,
}

fn sequence_key(script: &TestScript) -> String {
    script
        .kinds()
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Sequences occurring at least `min_count` times, most frequent first
pub fn common_patterns(scripts: &[TestScript], min_count: usize) -> Vec<Pattern> {
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashMap<String, (usize, Vec<String>)> = HashMap::new();

    for script in scripts {
        let key = sequence_key(script);
        let entry = seen.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0, Vec::new())
        });
        entry.0 += 1;
        entry.1.push(script.name.clone());
    }

    let mut patterns: Vec<Pattern> = order
        .into_iter()
        .filter_map(|key| {
            let (count, mut examples) = seen.remove(&key)?;
            if count < min_count {
                return None;
            }
            examples.truncate(MAX_EXAMPLES);
            Some(Pattern {
                pattern: key,
                count,
                examples,
            })
        })
        .collect();

    // Stable sort keeps first-seen order among equal counts
    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}

/// First selector previously used for the same kind and step description
pub fn suggest_selector<'a>(
    scripts: &'a [TestScript],
    kind: ActionKind,
    description: &str,
) -> Option<&'a str> {
    scripts
        .iter()
        .flat_map(|s| s.steps.iter())
        .filter(|step| step.action.kind == kind && step.description == description)
        .find_map(|step| step.action.selector.as_deref())
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Workflows of three or more steps resembling the description, best first
pub fn similar_workflows(scripts: &[TestScript], description: &str, limit: usize) -> Vec<Workflow> {
    let wanted = tokens(description);

    let mut ranked: Vec<Workflow> = scripts
        .iter()
        .filter(|s| s.steps.len() >= MIN_WORKFLOW_STEPS)
        .filter_map(|s| {
            let similarity = jaccard(&wanted, &tokens(&format!("{} {}", s.name, s.description)));
            (similarity > SIMILARITY_THRESHOLD).then(|| Workflow {
                name: s.name.clone(),
                description: s.description.clone(),
                similarity,
                steps: s
                    .steps
                    .iter()
                    .map(|step| WorkflowStep {
                        kind: step.action.kind,
                        description: step.description.clone(),
                    })
                    .collect(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ScriptMode, TestStep};

    fn script(name: &str, description: &str, actions: Vec<Action>) -> TestScript {
        actions.into_iter().fold(
            TestScript::new(name, description, ScriptMode::Dumb),
            |s, a| s.with_step(TestStep::new(format!("{} step", a.kind), a)),
        )
    }

    fn login(name: &str) -> TestScript {
        script(
            name,
            "log into the admin panel",
            vec![
                Action::navigate("https://example.com"),
                Action::type_text("#username", "admin"),
                Action::click("#login"),
            ],
        )
    }

    #[test]
    fn test_common_patterns_counts_and_orders() {
        let scripts = vec![
            login("login_1"),
            script("smoke", "", vec![Action::navigate("https://example.com")]),
            login("login_2"),
            login("login_3"),
        ];

        let patterns = common_patterns(&scripts, 2);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern, "navigate -> type -> click");
        assert_eq!(patterns[0].count, 3);
        assert_eq!(patterns[0].examples, vec!["login_1", "login_2", "login_3"]);

        let all = common_patterns(&scripts, 1);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].pattern, "navigate");
    }

    #[test]
    fn test_examples_are_capped() {
        let scripts: Vec<_> = (0..7).map(|i| login(&format!("l{}", i))).collect();
        assert_eq!(common_patterns(&scripts, 2)[0].examples.len(), 5);
    }

    #[test]
    fn test_suggest_selector() {
        let scripts = vec![login("a")];
        assert_eq!(
            suggest_selector(&scripts, ActionKind::Click, "click step"),
            Some("#login")
        );
        assert_eq!(suggest_selector(&scripts, ActionKind::Click, "other"), None);
    }

    #[test]
    fn test_similar_workflows() {
        let scripts = vec![
            login("admin_login"),
            script(
                "checkout",
                "buy a product",
                vec![Action::click("#a"), Action::click("#b"), Action::click("#c")],
            ),
            script("short", "log into the admin panel", vec![Action::click("#a")]),
        ];

        let found = similar_workflows(&scripts, "Log into admin", 5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "admin_login");
        assert_eq!(found[0].steps.len(), 3);
        assert!(found[0].similarity > 0.1);

        assert!(similar_workflows(&scripts, "Log into admin", 0).is_empty());
    }
}
