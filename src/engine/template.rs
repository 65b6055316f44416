//! Expected-response templates.
//!
//! Two back-reference forms are supported, both scoped to the path being run:
//!   - `${n}`   → the user input scripted at step `n`
//!   - `${n-m}` → the entity with index `m` annotated on step `n`'s input
//!
//! All `${n}` references are substituted before any `${n-m}` reference.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::script::StepAction;

static INPUT_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\d+)\}").expect("static regex"));
static ENTITY_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\d+)-(\d+)\}").expect("static regex"));

/// A back-reference that cannot be satisfied from the path's own turns.
/// This is a script defect, not a bot failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("'{placeholder}' refers to step {step_number}, which is not on this path")]
    MissingStep {
        placeholder: String,
        step_number: i64,
    },

    #[error("'{placeholder}' refers to entity {index} of step {step_number}, which has no such entity")]
    MissingEntity {
        placeholder: String,
        step_number: i64,
        index: u32,
    },
}

/// Substitute every back-reference in `template` using `actions`.
pub fn resolve(actions: &[StepAction], template: &str) -> Result<String, ResolveError> {
    let with_inputs = replace_all(&INPUT_REF, template, |caps| {
        let (placeholder, step_number) = (caps[0].to_string(), parse_step(&caps[1]));
        find_action(actions, step_number)
            .map(|a| a.input.clone())
            .ok_or(ResolveError::MissingStep {
                placeholder,
                step_number,
            })
    })?;

    replace_all(&ENTITY_REF, &with_inputs, |caps| {
        let placeholder = caps[0].to_string();
        let step_number = parse_step(&caps[1]);
        let action = find_action(actions, step_number).ok_or_else(|| ResolveError::MissingStep {
            placeholder: placeholder.clone(),
            step_number,
        })?;
        let index = caps[2].parse::<u32>().ok();
        index
            .and_then(|i| action.entities.iter().find(|e| e.index == i))
            .map(|e| e.name.clone())
            .ok_or(ResolveError::MissingEntity {
                placeholder,
                step_number,
                index: index.unwrap_or(u32::MAX),
            })
    })
}

/// Oversized step numbers can never match a scripted step.
fn parse_step(digits: &str) -> i64 {
    digits.parse::<i64>().unwrap_or(i64::MIN)
}

fn find_action(actions: &[StepAction], step_number: i64) -> Option<&StepAction> {
    actions.iter().find(|a| a.step_number == step_number)
}

/// `Regex::replace_all` with a fallible replacer.
fn replace_all<F>(re: &Regex, text: &str, mut replacer: F) -> Result<String, ResolveError>
where
    F: FnMut(&Captures) -> Result<String, ResolveError>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..m.start()]);
        out.push_str(&replacer(&caps)?);
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}
