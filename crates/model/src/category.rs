// Copyright 2025 Cronwheel Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

/// Execution environment a job runs inside.
///
/// Mirrored under `<categories-prefix>/<name>`. The name doubles as a
/// coordinator path segment and therefore must not contain `/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,

    pub is_active: bool,

    /// Probe command run to validate the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_command: Option<String>,

    /// Command prefixed to every job command of the category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_command: Option<String>,

    /// Command appended after every job command of the category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_command: Option<String>,
}

impl Category {
    /// Whether the name is usable as a coordinator path segment.
    #[must_use]
    pub fn name_is_valid(name: &str) -> bool { !name.is_empty() && !name.contains('/') }

    /// Wrap a job command with the category's setup and teardown.
    #[must_use]
    pub fn wrap_command(&self, command: &str) -> String {
        match (self.setup_command.as_deref(), self.teardown_command.as_deref()) {
            (None, None) => command.to_string(),
            (Some(setup), None) => format!("{setup} && {command}"),
            (None, Some(teardown)) => format!("{command}; {teardown}"),
            (Some(setup), Some(teardown)) => format!("{setup} && {command}; {teardown}"),
        }
    }
}

/// Closed set of mutable category fields for partial updates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryPatch {
    pub is_active:        Option<bool>,
    pub check_command:    Option<String>,
    pub setup_command:    Option<String>,
    pub teardown_command: Option<String>,
}

impl CategoryPatch {
    pub fn apply(self, category: &mut Category) {
        if let Some(is_active) = self.is_active {
            category.is_active = is_active;
        }
        if let Some(check) = self.check_command {
            category.check_command = (!check.is_empty()).then_some(check);
        }
        if let Some(setup) = self.setup_command {
            category.setup_command = (!setup.is_empty()).then_some(setup);
        }
        if let Some(teardown) = self.teardown_command {
            category.teardown_command = (!teardown.is_empty()).then_some(teardown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(Category::name_is_valid("default"));
        assert!(!Category::name_is_valid(""));
        assert!(!Category::name_is_valid("a/b"));
    }

    #[test]
    fn wrap_command_composes_setup_and_teardown() {
        let mut category = Category {
            name:             "default".to_string(),
            is_active:        true,
            check_command:    None,
            setup_command:    None,
            teardown_command: None,
        };
        assert_eq!(category.wrap_command("echo hi"), "echo hi");

        category.setup_command = Some("cd /srv".to_string());
        assert_eq!(category.wrap_command("echo hi"), "cd /srv && echo hi");

        category.teardown_command = Some("rm -f lock".to_string());
        assert_eq!(category.wrap_command("echo hi"), "cd /srv && echo hi; rm -f lock");
    }

    #[test]
    fn patch_clears_commands_with_empty_strings() {
        let mut category = Category {
            name:             "default".to_string(),
            is_active:        true,
            check_command:    Some("true".to_string()),
            setup_command:    None,
            teardown_command: None,
        };
        let patch: CategoryPatch = serde_json::from_str(r#"{"check_command":""}"#).unwrap();
        patch.apply(&mut category);
        assert_eq!(category.check_command, None);
    }
}
