//! Control channel and debug-draw collaborator interface (§6).
//!
//! Grounded on `original_source/.../dedaiCommandExecuter.cpp` for the
//! tokenize-and-dispatch command bus, and `devmode/dedaiDeveloperMode.*` for
//! the toggle set `dm_*` commands flip. Dispatch uses a small table instead
//! of the source's `if`/`else if` chain, but answers the same one-line
//! questions with the same one-line answers.

use std::collections::HashMap;

/// Opaque handle minted by this crate for a debug-draw shape bound to one
/// Space/Blocker/Navigator. Never constructed by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugShapeHandle(u64);

/// RGBA fill colour for a debug-draw face shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Host-implemented collaborator this crate calls to draw and clear shapes.
/// This crate never renders anything itself - it only calls the trait,
/// matching §1's framing of debug-draw as a narrow external collaborator.
pub trait DebugDraw {
    fn upsert_face_shape(&mut self, handle: DebugShapeHandle, faces: &[glam::DVec3], fill: Option<Color>);
    fn remove_shape(&mut self, handle: DebugShapeHandle);
}

/// Mints [`DebugShapeHandle`]s in order; the id is otherwise meaningless.
#[derive(Debug, Default)]
pub struct DebugShapeAllocator {
    next: u64,
}

impl DebugShapeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> DebugShapeHandle {
        let handle = DebugShapeHandle(self.next);
        self.next += 1;
        handle
    }
}

/// Toggles named in §6, plus the update counter debug-draw refresh compares
/// against to decide whether a cached shape is stale.
#[derive(Debug, Clone, Copy)]
pub struct DeveloperMode {
    pub enabled: bool,
    pub show_spaces: bool,
    pub show_space_links: bool,
    pub show_blockers: bool,
    pub show_path: bool,
    pub show_path_faces: bool,
    pub hilight_cost_type: i32,
    pub quick_debug: i32,
    update_counter: u64,
}

impl Default for DeveloperMode {
    fn default() -> Self {
        DeveloperMode {
            enabled: false,
            show_spaces: false,
            show_space_links: false,
            show_blockers: false,
            show_path: false,
            show_path_faces: false,
            hilight_cost_type: -1,
            quick_debug: 0,
            update_counter: 0,
        }
    }
}

impl DeveloperMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    fn bump(&mut self) {
        self.update_counter += 1;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.bump();
    }

    pub fn set_show_spaces(&mut self, value: bool) {
        self.show_spaces = value;
        self.bump();
    }

    pub fn set_show_space_links(&mut self, value: bool) {
        self.show_space_links = value;
        self.bump();
    }

    pub fn set_show_blockers(&mut self, value: bool) {
        self.show_blockers = value;
        self.bump();
    }

    pub fn set_show_path(&mut self, value: bool) {
        self.show_path = value;
        self.bump();
    }

    pub fn set_show_path_faces(&mut self, value: bool) {
        self.show_path_faces = value;
        self.bump();
    }

    pub fn set_hilight_cost_type(&mut self, value: i32) {
        self.hilight_cost_type = value;
        self.bump();
    }

    pub fn set_quick_debug(&mut self, value: i32) {
        self.quick_debug = value;
        self.bump();
    }
}

type CommandFn = fn(&mut DeveloperMode, Option<&str>) -> String;

fn on_off(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn parse_bool_arg(arg: Option<&str>) -> Option<bool> {
    match arg? {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn dm_enable(mode: &mut DeveloperMode, _arg: Option<&str>) -> String {
    mode.set_enabled(true);
    "dm_enable: ok".to_string()
}

fn dm_show_spaces(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    toggle(mode, arg, "dm_show_spaces", |m| &mut m.show_spaces, DeveloperMode::bump)
}

fn dm_show_space_links(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    toggle(mode, arg, "dm_show_space_links", |m| &mut m.show_space_links, DeveloperMode::bump)
}

fn dm_show_blockers(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    toggle(mode, arg, "dm_show_blockers", |m| &mut m.show_blockers, DeveloperMode::bump)
}

fn dm_show_path(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    toggle(mode, arg, "dm_show_path", |m| &mut m.show_path, DeveloperMode::bump)
}

fn dm_show_path_faces(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    toggle(mode, arg, "dm_show_path_faces", |m| &mut m.show_path_faces, DeveloperMode::bump)
}

fn toggle(mode: &mut DeveloperMode, arg: Option<&str>, name: &str, field: impl Fn(&mut DeveloperMode) -> &mut bool, bump: fn(&mut DeveloperMode)) -> String {
    if let Some(arg) = arg {
        let Some(value) = parse_bool_arg(Some(arg)) else { return format!("{name}: expected 1 or 0, got '{arg}'.") };
        *field(mode) = value;
        bump(mode);
        format!("{name}: {}", on_off(value))
    } else {
        format!("{name}: {}", on_off(*field(mode)))
    }
}

fn dm_space_hilight_cost_type(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    if let Some(arg) = arg {
        let Ok(value) = arg.parse::<i32>() else { return format!("dm_space_hilight_cost_type: expected an integer, got '{arg}'.") };
        mode.set_hilight_cost_type(value);
        format!("dm_space_hilight_cost_type: {value}")
    } else {
        format!("dm_space_hilight_cost_type: {}", mode.hilight_cost_type)
    }
}

fn dm_quick_debug(mode: &mut DeveloperMode, arg: Option<&str>) -> String {
    if let Some(arg) = arg {
        let Ok(value) = arg.parse::<i32>() else { return format!("dm_quick_debug: expected an integer, got '{arg}'.") };
        mode.set_quick_debug(value);
        format!("dm_quick_debug: {value}")
    } else {
        format!("dm_quick_debug: {}", mode.quick_debug)
    }
}

/// String command bus: one line of input (`command arg...`), one line of
/// human-readable answer (§6). Holds the [`DeveloperMode`] every `dm_*`
/// command reads and writes.
pub struct DebugCommandBus {
    mode: DeveloperMode,
    commands: HashMap<&'static str, (CommandFn, &'static str)>,
}

impl Default for DebugCommandBus {
    fn default() -> Self {
        let mut commands: HashMap<&'static str, (CommandFn, &'static str)> = HashMap::new();
        commands.insert("dm_enable", (dm_enable as CommandFn, "enable developer/debug mode"));
        commands.insert("dm_show_spaces", (dm_show_spaces as CommandFn, "toggle space wireframe display"));
        commands.insert("dm_show_space_links", (dm_show_space_links as CommandFn, "toggle cross-space link display"));
        commands.insert("dm_show_blockers", (dm_show_blockers as CommandFn, "toggle blocker volume display"));
        commands.insert("dm_show_path", (dm_show_path as CommandFn, "toggle last path display"));
        commands.insert("dm_show_path_faces", (dm_show_path_faces as CommandFn, "toggle path face highlight"));
        commands.insert("dm_space_hilight_cost_type", (dm_space_hilight_cost_type as CommandFn, "highlight faces of a cost type, -1 to disable"));
        commands.insert("dm_quick_debug", (dm_quick_debug as CommandFn, "opaque debug channel"));
        DebugCommandBus { mode: DeveloperMode::new(), commands }
    }
}

impl DebugCommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn developer_mode(&self) -> &DeveloperMode {
        &self.mode
    }

    /// Tokenizes `line` on whitespace (first token is the command, the rest
    /// its single argument) and dispatches it, returning a one-line answer.
    pub fn execute(&mut self, line: &str) -> String {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else { return "Unknown command ''.".to_string() };
        let arg = tokens.next();

        if command == "help" {
            return self.help();
        }

        match self.commands.get(command) {
            Some((handler, _)) if command == "dm_enable" || self.mode.enabled => handler(&mut self.mode, arg),
            Some(_) => format!("{command}: developer mode is disabled, call dm_enable first."),
            None => format!("Unknown command '{command}'."),
        }
    }

    fn help(&self) -> String {
        let mut names: Vec<&&str> = self.commands.keys().collect();
        names.sort();
        let mut lines = vec!["help - list all commands".to_string()];
        lines.extend(names.into_iter().map(|name| format!("{name} - {}", self.commands[name].1)));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_reports_itself() {
        let mut bus = DebugCommandBus::new();
        assert_eq!(bus.execute("frobnicate"), "Unknown command 'frobnicate'.");
    }

    #[test]
    fn dm_commands_are_gated_until_enabled() {
        let mut bus = DebugCommandBus::new();
        assert!(bus.execute("dm_show_spaces 1").contains("disabled"));
        bus.execute("dm_enable");
        assert_eq!(bus.execute("dm_show_spaces 1"), "dm_show_spaces: 1");
        assert!(bus.developer_mode().show_spaces);
    }

    #[test]
    fn setter_without_argument_echoes_current_state() {
        let mut bus = DebugCommandBus::new();
        bus.execute("dm_enable");
        bus.execute("dm_show_blockers 1");
        assert_eq!(bus.execute("dm_show_blockers"), "dm_show_blockers: 1");
    }

    #[test]
    fn toggling_bumps_the_update_counter() {
        let mut mode = DeveloperMode::new();
        let before = mode.update_counter();
        mode.set_show_path(true);
        assert_eq!(mode.update_counter(), before + 1);
    }

    #[test]
    fn help_lists_every_command() {
        let mut bus = DebugCommandBus::new();
        let text = bus.execute("help");
        assert!(text.contains("dm_quick_debug"));
        assert!(text.contains("dm_space_hilight_cost_type"));
    }
}
