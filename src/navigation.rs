// =============================================================================
// Navigation Stack — view history for the dashboard shell
// =============================================================================
//
// Rules applied by `navigate`:
//   1. Target identical to the top entry  -> no change.
//   2. Target is a primary tab            -> reset to a single entry.
//   3. Target view equals the top view    -> replace the top (new context).
//   4. Otherwise                          -> push.
//
// `back` pops the top entry but never empties the stack.
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Dashboard,
    Market,
    Trade,
    Options,
    AiAssistant,
    Settings,
    Profile,
    Withdrawal,
    Mining,
    MiningRules,
    MiningOrders,
    MiningInvestment,
    History,
}

impl View {
    /// Bottom-bar tabs. Selecting one starts a fresh history.
    pub const PRIMARY: [View; 5] = [
        View::Dashboard,
        View::Market,
        View::Trade,
        View::Options,
        View::AiAssistant,
    ];

    pub fn is_primary(self) -> bool {
        Self::PRIMARY.contains(&self)
    }
}

/// Parameters a view was opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub view: View,
    #[serde(default)]
    pub context: ViewContext,
}

/// What `navigate` did to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavOutcome {
    Unchanged,
    Reset,
    Replaced,
    Pushed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationStack {
    entries: Vec<NavEntry>,
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new(View::Dashboard)
    }
}

impl NavigationStack {
    pub fn new(root: View) -> Self {
        Self {
            entries: vec![NavEntry {
                view: root,
                context: ViewContext::default(),
            }],
        }
    }

    pub fn current(&self) -> &NavEntry {
        // The stack is never empty: `new` seeds one entry and `back` keeps it.
        &self.entries[self.entries.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[NavEntry] {
        &self.entries
    }

    pub fn navigate(&mut self, view: View, context: ViewContext) -> NavOutcome {
        let top = self.current();
        if top.view == view && top.context == context {
            return NavOutcome::Unchanged;
        }
        let same_view = top.view == view;

        let entry = NavEntry { view, context };

        if view.is_primary() {
            self.entries.clear();
            self.entries.push(entry);
            return NavOutcome::Reset;
        }

        if same_view {
            let last = self.entries.len() - 1;
            self.entries[last] = entry;
            NavOutcome::Replaced
        } else {
            self.entries.push(entry);
            NavOutcome::Pushed
        }
    }

    /// Pop one entry. Returns `false` when already at the root.
    pub fn back(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(id: &str) -> ViewContext {
        ViewContext {
            plan_id: Some(id.to_string()),
            pair: None,
        }
    }

    #[test]
    fn primary_tab_resets_history() {
        let mut nav = NavigationStack::default();
        nav.navigate(View::Mining, ViewContext::default());
        nav.navigate(View::MiningRules, ViewContext::default());
        assert_eq!(nav.depth(), 3);

        assert_eq!(nav.navigate(View::Market, ViewContext::default()), NavOutcome::Reset);
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current().view, View::Market);
    }

    #[test]
    fn same_view_new_context_replaces_top() {
        let mut nav = NavigationStack::default();
        nav.navigate(View::Mining, ViewContext::default());
        nav.navigate(View::MiningInvestment, plan("p7"));
        assert_eq!(nav.navigate(View::MiningInvestment, plan("p30")), NavOutcome::Replaced);
        assert_eq!(nav.depth(), 3);
        assert_eq!(nav.current().context, plan("p30"));
    }

    #[test]
    fn new_view_pushes() {
        let mut nav = NavigationStack::default();
        assert_eq!(nav.navigate(View::Withdrawal, ViewContext::default()), NavOutcome::Pushed);
        assert_eq!(nav.navigate(View::History, ViewContext::default()), NavOutcome::Pushed);
        assert_eq!(nav.depth(), 3);
    }

    #[test]
    fn identical_target_is_a_no_op() {
        let mut nav = NavigationStack::default();
        nav.navigate(View::MiningInvestment, plan("p7"));
        assert_eq!(nav.navigate(View::MiningInvestment, plan("p7")), NavOutcome::Unchanged);
        assert_eq!(nav.navigate(View::Dashboard, ViewContext::default()), NavOutcome::Reset);
        assert_eq!(nav.navigate(View::Dashboard, ViewContext::default()), NavOutcome::Unchanged);
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn back_never_empties_the_stack() {
        let mut nav = NavigationStack::default();
        nav.navigate(View::Settings, ViewContext::default());
        assert!(nav.back());
        assert_eq!(nav.current().view, View::Dashboard);
        assert!(!nav.back());
        assert_eq!(nav.depth(), 1);
    }
}
