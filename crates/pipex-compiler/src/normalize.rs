//! Canonical forms for shorthand constructs
//!
//! Applied to every mapping after its entries are expanded:
//!
//! * shorthand steps (`script`, `bash`, `pwsh`, `powershell`, `checkout`)
//!   become full `task` steps with `inputs`
//! * a string `pool` becomes `{name: ...}`
//! * a string `dependsOn` becomes a one-element sequence

use pipex_core::{Mapping, Value};

/// Task reference emitted for `checkout` steps
pub const CHECKOUT_TASK: &str = "6d15af64-176c-496d-b583-fd2ae21d4df4@1";

/// Checkout options moved into `inputs`
const CHECKOUT_INPUTS: [&str; 7] = [
    "clean",
    "fetchDepth",
    "fetchTags",
    "lfs",
    "submodules",
    "path",
    "persistCredentials",
];

/// Mappings under these keys hold user data and are left alone
const OPAQUE_PARENTS: [&str; 3] = ["parameters", "inputs", "variables"];

/// Where a mapping sits in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    Root,
    /// Value of a mapping entry
    Value(&'a str),
    /// Item of a sequence that is the value of a mapping entry
    Item(&'a str),
}

impl<'a> Position<'a> {
    pub fn key(&self) -> Option<&'a str> {
        match self {
            Position::Root => None,
            Position::Value(key) | Position::Item(key) => Some(key),
        }
    }
}

struct Shorthand {
    task: &'static str,
    inline: bool,
    pwsh: bool,
}

fn shorthand(key: &str) -> Option<Shorthand> {
    let (task, inline, pwsh) = match key {
        "script" => ("CmdLine@2", false, false),
        "bash" => ("Bash@3", true, false),
        "pwsh" => ("PowerShell@2", true, true),
        "powershell" => ("PowerShell@2", true, false),
        _ => return None,
    };
    Some(Shorthand { task, inline, pwsh })
}

/// Rewrite `map` into canonical form for its position
pub fn normalize(map: Mapping, position: Position<'_>) -> Mapping {
    if position.key().is_some_and(|k| OPAQUE_PARENTS.contains(&k)) {
        return map;
    }

    let map = if position == Position::Item("steps") && !map.contains_key("task") {
        normalize_step(map)
    } else {
        map
    };

    map.into_iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("pool", Value::String(name)) => {
                    let mut pool = Mapping::new();
                    pool.insert("name", Value::String(name));
                    Value::Mapping(pool)
                }
                ("dependsOn", Value::String(dep)) => Value::Sequence(vec![Value::String(dep)]),
                (_, value) => value,
            };
            (key, value)
        })
        .collect()
}

fn normalize_step(map: Mapping) -> Mapping {
    if let Some(Value::String(_)) | Some(Value::Null) = map.get("checkout") {
        return normalize_checkout(map);
    }
    let Some(kind) = map.keys().find_map(|k| shorthand(k).map(|s| (k.clone(), s))) else {
        return map;
    };
    let (script_key, kind) = kind;

    let mut inputs = match map.get("inputs") {
        Some(Value::Mapping(existing)) => existing.clone(),
        _ => Mapping::new(),
    };
    let mut out = Mapping::with_capacity(map.len() + 1);

    for (key, value) in map {
        if key == script_key {
            out.insert("task", Value::string(kind.task));
            let mut step_inputs = Mapping::new();
            if kind.inline {
                step_inputs.insert("targetType", Value::string("inline"));
            }
            step_inputs.insert("script", value);
            if kind.pwsh {
                step_inputs.insert("pwsh", Value::Bool(true));
            }
            step_inputs.merge(std::mem::take(&mut inputs));
            out.insert("inputs", Value::Mapping(step_inputs));
        } else if key == "workingDirectory" {
            move_input(&mut out, &mut inputs, key, value);
        } else if key != "inputs" {
            out.insert(key, value);
        }
    }
    out
}

fn normalize_checkout(map: Mapping) -> Mapping {
    let mut out = Mapping::with_capacity(map.len() + 1);
    let mut inputs = match map.get("inputs") {
        Some(Value::Mapping(existing)) => existing.clone(),
        _ => Mapping::new(),
    };
    let mut is_none = false;

    for (key, value) in map {
        if key == "checkout" {
            is_none = value.as_str() == Some("none");
            out.insert("task", Value::string(CHECKOUT_TASK));
            let mut step_inputs = Mapping::new();
            step_inputs.insert("repository", value);
            step_inputs.merge(std::mem::take(&mut inputs));
            out.insert("inputs", Value::Mapping(step_inputs));
        } else if CHECKOUT_INPUTS.contains(&key.as_str()) {
            move_input(&mut out, &mut inputs, key, value);
        } else if key != "inputs" {
            out.insert(key, value);
        }
    }

    if is_none && !out.contains_key("condition") {
        out.insert("condition", Value::Bool(false));
    }
    out
}

/// Move an option into `inputs`, whether or not `inputs` was emitted yet
fn move_input(out: &mut Mapping, pending: &mut Mapping, key: String, value: Value) {
    match out.get_mut("inputs") {
        Some(Value::Mapping(inputs)) => {
            inputs.insert(key, value);
        }
        _ => {
            pending.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipex_parser::YamlParser;

    fn step(yaml: &str) -> Mapping {
        let value = YamlParser::parse(yaml).unwrap();
        normalize(value.as_mapping().unwrap().clone(), Position::Item("steps"))
    }

    #[test]
    fn test_script_step() {
        let out = step("script: echo hi\ndisplayName: Say hi\nworkingDirectory: src\n");
        assert_eq!(out.get("task"), Some(&Value::string("CmdLine@2")));
        let inputs = out.get("inputs").unwrap().as_mapping().unwrap();
        assert_eq!(inputs.get("script"), Some(&Value::string("echo hi")));
        assert_eq!(inputs.get("workingDirectory"), Some(&Value::string("src")));
        assert_eq!(out.get("displayName"), Some(&Value::string("Say hi")));
        assert!(!out.contains_key("workingDirectory"));
    }

    #[test]
    fn test_pwsh_step() {
        let out = step("pwsh: Write-Host hi\n");
        assert_eq!(out.get("task"), Some(&Value::string("PowerShell@2")));
        let inputs = out.get("inputs").unwrap().as_mapping().unwrap();
        assert_eq!(inputs.get("targetType"), Some(&Value::string("inline")));
        assert_eq!(inputs.get("pwsh"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_checkout_none() {
        let out = step("checkout: none\n");
        assert_eq!(out.get("task"), Some(&Value::string(CHECKOUT_TASK)));
        assert_eq!(out.get("condition"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_checkout_options_move_to_inputs() {
        let out = step("checkout: self\nfetchDepth: 1\nclean: true\ndisplayName: co\n");
        let inputs = out.get("inputs").unwrap().as_mapping().unwrap();
        assert_eq!(inputs.get("repository"), Some(&Value::string("self")));
        assert_eq!(inputs.get("fetchDepth"), Some(&Value::Number(1.0)));
        assert_eq!(inputs.get("clean"), Some(&Value::Bool(true)));
        assert!(!out.contains_key("condition"));
    }

    #[test]
    fn test_task_steps_untouched() {
        let out = step("task: Foo@1\nscript: x\n");
        assert_eq!(out.get("script"), Some(&Value::string("x")));
    }

    #[test]
    fn test_pool_and_depends_on() {
        let value = YamlParser::parse("job: a\npool: linux\ndependsOn: b\n").unwrap();
        let out = normalize(value.as_mapping().unwrap().clone(), Position::Item("jobs"));
        assert_eq!(
            out.get("pool").and_then(|p| p.get("name")),
            Some(&Value::string("linux"))
        );
        assert_eq!(
            out.get("dependsOn"),
            Some(&Value::Sequence(vec![Value::string("b")]))
        );
    }

    #[test]
    fn test_parameters_are_opaque() {
        let value = YamlParser::parse("pool: linux\n").unwrap();
        let out = normalize(value.as_mapping().unwrap().clone(), Position::Value("parameters"));
        assert_eq!(out.get("pool"), Some(&Value::string("linux")));
    }
}
