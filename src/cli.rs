use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, Parser};
use dialoguer::Confirm;
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use mindflow::config::EditorConfig;
use mindflow::editor::{Action, Editor, Notice, NoticeLevel, Tool};
use mindflow::export::{ExportFormat, artifact_name, export};
use mindflow::mindmap::{MindMap, NodeEdit, NodeId};
use mindflow::persistence::{FileStorage, Storage};
use mindflow::settings::{Settings, Theme};
use mindflow::viewport::WheelInput;
use mindflow::{Point, visibility};

#[cfg(feature = "server")]
use mindflow::serve::{ServeArgs, run_serve};

const HELP: &str = "\
Actions:   add-child add-sibling delete undo redo save zoom-in zoom-out zoom-reset
           deselect auto-layout expand-all collapse-all toggle-collapse center
           new-map [--yes]
Selection: select <id> | tool <select|add|delete|connect> | click [<id>] | dblclick [<id>]
Editing:   text <label> | notes <text> | color <token> | icon <name|none> | title <text>
           connect <id> <id> | drag <id> <dx> <dy>
View:      pan <dx> <dy> | wheel <dy> [ctrl] [shift] | show | status
Study:     summary | flashcards
Other:     export <json|svg|png|pdf> [path] | set <theme|autosave|snap> <value> | help | quit";

/// Where the map and settings live and how large the canvas is.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Directory holding the saved map and settings (overrides MINDFLOW_DATA_DIR).
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Canvas width in pixels.
    #[arg(long = "width")]
    width: Option<f64>,

    /// Canvas height in pixels.
    #[arg(long = "height")]
    height: Option<f64>,
}

impl StoreArgs {
    fn config(&self) -> Result<EditorConfig> {
        let mut config = EditorConfig::default();
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        for (flag, value) in [("--width", self.width), ("--height", self.height)] {
            if value.is_some_and(|v| !(v.is_finite() && v > 0.0)) {
                bail!("{flag} must be a positive number");
            }
        }
        if let Some(width) = self.width {
            config.canvas_width = width;
        }
        if let Some(height) = self.height {
            config.canvas_height = height;
        }
        Ok(config)
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mindflow",
    about = "Edit the current mind map from the terminal. Subcommands: edit, render, export, new, serve."
)]
pub struct EditArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Do not print the outline after each command.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(name = "mindflow render", about = "Render the current mind map to SVG.")]
pub struct RenderArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Render this map JSON file instead of the saved map.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Background color (defaults to the theme's canvas color).
    #[arg(short = 'b', long = "background-color")]
    background_color: Option<String>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(name = "mindflow export", about = "Export the current mind map.")]
pub struct ExportArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Export format: json, svg, png or pdf.
    #[arg(short = 'f', long = "format", default_value = "json")]
    format: ExportFormat,

    /// Export this map JSON file instead of the saved map.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Path to the output file. Use '-' to write to stdout. Defaults to the
    /// map title with whitespace replaced by underscores.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(name = "mindflow new", about = "Replace the saved mind map with a fresh one.")]
pub struct NewArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Title for the new map.
    #[arg(short = 't', long = "title")]
    title: Option<String>,

    /// Replace an existing map without asking.
    #[arg(short = 'y', long = "yes", action = ArgAction::SetTrue)]
    yes: bool,
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            #[cfg(feature = "server")]
            {
                let serve_args = ServeArgs::parse_from(subcommand_args(&args));
                run_serve(serve_args, EditorConfig::default()).await
            }
            #[cfg(not(feature = "server"))]
            {
                return Err(anyhow!(
                    "'serve' command requires the 'server' feature to be enabled"
                ));
            }
        }
        Some("render") => run_render(RenderArgs::parse_from(subcommand_args(&args))),
        Some("export") => run_export(ExportArgs::parse_from(subcommand_args(&args))),
        Some("new") => run_new(NewArgs::parse_from(subcommand_args(&args))),
        Some("edit") => run_edit(EditArgs::parse_from(subcommand_args(&args))).await,
        _ => run_edit(EditArgs::parse_from(args)).await,
    }
}

fn subcommand_args(args: &[String]) -> impl Iterator<Item = String> + '_ {
    args.iter().take(1).chain(args.iter().skip(2)).cloned()
}

fn open_editor(store: &StoreArgs) -> Result<(Editor, EditorConfig)> {
    let config = store.config()?;
    let storage = FileStorage::new(config.data_dir.clone());
    let mut editor = Editor::open(Box::new(storage), &config);
    print_notices(&mut editor, true);
    Ok((editor, config))
}

/// The map to render or export: an explicit JSON file, or the saved map.
fn load_map(store: &StoreArgs, input: Option<&Path>) -> Result<(MindMap, Settings)> {
    match input {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            let map: MindMap = serde_json::from_str(&raw)
                .with_context(|| format!("'{}' is not a mind map", path.display()))?;
            map.validate()
                .map_err(|err| anyhow!("'{}' is not a valid mind map: {err}", path.display()))?;
            let config = store.config()?;
            let settings = FileStorage::new(config.data_dir)
                .load_settings()
                .ok()
                .flatten()
                .unwrap_or_default();
            Ok((map, settings))
        }
        None => {
            let (editor, _) = open_editor(store)?;
            Ok((editor.map().clone(), editor.settings().clone()))
        }
    }
}

fn parse_output(output: Option<&str>, default_name: String) -> Result<OutputDestination> {
    match output {
        Some("-") => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
        None => Ok(OutputDestination::File(PathBuf::from(default_name))),
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Generated mind map -> {}", path.display());
            }
        }
    }
    Ok(())
}

fn run_render(cli: RenderArgs) -> Result<()> {
    let (map, settings) = load_map(&cli.store, cli.input.as_deref())?;
    let background = cli
        .background_color
        .clone()
        .unwrap_or_else(|| settings.theme.background().to_string());
    let dest = parse_output(cli.output.as_deref(), artifact_name(&map, ExportFormat::Svg))?;
    let bytes = export(&map, ExportFormat::Svg, &background)?;
    write_output(dest, &bytes, cli.quiet)
}

fn run_export(cli: ExportArgs) -> Result<()> {
    let (map, settings) = load_map(&cli.store, cli.input.as_deref())?;
    let dest = parse_output(cli.output.as_deref(), artifact_name(&map, cli.format))?;
    let bytes = export(&map, cli.format, settings.theme.background())?;
    write_output(dest, &bytes, cli.quiet)
}

fn run_new(cli: NewArgs) -> Result<()> {
    let config = cli.store.config()?;
    let storage = FileStorage::new(config.data_dir.clone());
    let existing = storage.map_path();

    if existing.exists() && !cli.yes {
        let replace = Confirm::new()
            .with_prompt(format!("Replace the mind map saved in {}?", existing.display()))
            .default(false)
            .interact()
            .context("confirmation was cancelled; pass --yes to replace without asking")?;
        if !replace {
            println!("Kept the existing mind map.");
            return Ok(());
        }
    }

    let mut editor = Editor::open(Box::new(storage), &config);
    editor.drain_notices();
    editor.new_map();
    if let Some(title) = &cli.title {
        editor.set_title(title);
    }
    if !editor.save() {
        print_notices(&mut editor, true);
        bail!("failed to save the new mind map to {}", existing.display());
    }
    editor.drain_notices();

    println!("Created '{}' -> {}", editor.map().title, existing.display());
    Ok(())
}

async fn run_edit(cli: EditArgs) -> Result<()> {
    let (mut editor, config) = open_editor(&cli.store)?;

    println!(
        "Editing '{}' ({} nodes). Type 'help' for commands, 'quit' to leave.",
        editor.map().title,
        editor.map().nodes.len()
    );
    if !cli.quiet {
        print!("{}", outline(editor.map(), editor.selected())?);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut autosave = tokio::time::interval(config.autosave_interval);
    autosave.tick().await;

    prompt()?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        let show_outline = run_command(&mut editor, command)?;
                        print_notices(&mut editor, false);
                        if show_outline && !cli.quiet {
                            print!("{}", outline(editor.map(), editor.selected())?);
                        }
                    }
                    Err(err) => eprintln!("{err}"),
                }
                prompt()?;
            }
            _ = autosave.tick() => {
                editor.tick_autosave();
                print_notices(&mut editor, true);
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    if editor.is_dirty() && !editor.tick_autosave() {
        print_notices(&mut editor, true);
        if editor.settings().autosave {
            println!("Unsaved changes were discarded because the final save failed.");
        } else {
            println!("Unsaved changes were discarded (autosave is off; use 'save' next time).");
        }
    }
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "mindflow> ")?;
    stdout.flush()?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Action(Action),
    NewMap { discard: bool },
    Select(NodeId),
    Tool(Tool),
    Click(Option<NodeId>),
    DoubleClick(Option<NodeId>),
    Edit(NodeEdit),
    Title(String),
    Connect(NodeId, NodeId),
    Drag(NodeId, Point),
    Pan(Point),
    Wheel(WheelInput),
    Show,
    Status,
    Summary,
    Flashcards,
    Export(ExportFormat, Option<String>),
    Set(String, String),
    Help,
    Quit,
}

fn parse_id(token: Option<&str>) -> Result<NodeId> {
    let token = token.ok_or_else(|| anyhow!("missing node id"))?;
    token
        .parse()
        .with_context(|| format!("'{token}' is not a node id"))
}

fn parse_number(token: Option<&str>, what: &str) -> Result<f64> {
    let token = token.ok_or_else(|| anyhow!("missing {what}"))?;
    let value: f64 = token
        .parse()
        .with_context(|| format!("'{token}' is not a number"))?;
    if !value.is_finite() {
        bail!("{what} must be a finite number, got '{token}'");
    }
    Ok(value)
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (head, tail) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let tail = tail.trim();
    let mut words = tail.split_whitespace();

    let command = match head {
        "" | "show" | "ls" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "status" => Command::Status,
        "summary" => Command::Summary,
        "flashcards" => Command::Flashcards,
        "select" => Command::Select(parse_id(words.next())?),
        "new-map" => Command::NewMap {
            discard: match words.next() {
                None => false,
                Some("--yes" | "-y") => true,
                Some(other) => bail!("unknown option '{other}' for new-map"),
            },
        },
        "tool" => Command::Tool(
            words
                .next()
                .ok_or_else(|| anyhow!("missing tool name"))?
                .parse()
                .map_err(|err: String| anyhow!(err))?,
        ),
        "click" => Command::Click(words.next().map(|id| parse_id(Some(id))).transpose()?),
        "dblclick" => Command::DoubleClick(words.next().map(|id| parse_id(Some(id))).transpose()?),
        "text" => Command::Edit(NodeEdit {
            text: Some(tail.to_string()),
            ..NodeEdit::default()
        }),
        "notes" => Command::Edit(NodeEdit {
            notes: Some(tail.to_string()),
            ..NodeEdit::default()
        }),
        "color" => {
            if tail.is_empty() {
                bail!("missing color");
            }
            Command::Edit(NodeEdit {
                color: Some(tail.to_string()),
                ..NodeEdit::default()
            })
        }
        "icon" => Command::Edit(NodeEdit {
            icon: Some(match tail {
                "" | "none" => None,
                name => Some(name.to_string()),
            }),
            ..NodeEdit::default()
        }),
        "title" => Command::Title(tail.to_string()),
        "connect" => Command::Connect(parse_id(words.next())?, parse_id(words.next())?),
        "drag" => {
            let id = parse_id(words.next())?;
            let dx = parse_number(words.next(), "dx")?;
            let dy = parse_number(words.next(), "dy")?;
            Command::Drag(id, Point::new(dx, dy))
        }
        "pan" => {
            let dx = parse_number(words.next(), "dx")?;
            let dy = parse_number(words.next(), "dy")?;
            Command::Pan(Point::new(dx, dy))
        }
        "wheel" => {
            let delta_y = parse_number(words.next(), "delta")?;
            let mut input = WheelInput {
                delta_y,
                ..WheelInput::default()
            };
            for modifier in words {
                match modifier {
                    "ctrl" | "meta" => input.ctrl = true,
                    "shift" => input.shift = true,
                    other => bail!("unknown modifier '{other}'"),
                }
            }
            Command::Wheel(input)
        }
        "export" => {
            let format = words
                .next()
                .ok_or_else(|| anyhow!("missing export format"))?
                .parse()
                .map_err(|err: String| anyhow!(err))?;
            Command::Export(format, words.next().map(String::from))
        }
        "set" => {
            let key = words.next().ok_or_else(|| anyhow!("missing setting name"))?;
            let value = words.next().ok_or_else(|| anyhow!("missing value for '{key}'"))?;
            Command::Set(key.to_string(), value.to_string())
        }
        token => Command::Action(
            token
                .parse()
                .map_err(|err: String| anyhow!("{err}; type 'help' for commands"))?,
        ),
    };
    Ok(command)
}

fn parse_switch(value: &str) -> Result<bool> {
    match value {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => bail!("expected on or off, got '{other}'"),
    }
}

/// Runs one command. Returns whether the outline should be reprinted.
fn run_command(editor: &mut Editor, command: Command) -> Result<bool> {
    match command {
        Command::NewMap { discard } => {
            if editor.has_unsaved_changes() && !discard {
                println!("Unsaved changes would be lost; 'save' first or use 'new-map --yes'.");
                return Ok(false);
            }
            editor.apply(Action::NewMap);
        }
        Command::Action(action) => editor.apply(action),
        Command::Select(id) => editor.select(id),
        Command::Tool(tool) => {
            editor.set_tool(tool);
            return Ok(false);
        }
        Command::Click(target) => {
            let at = click_point(editor, target);
            editor.click(target, at);
        }
        Command::DoubleClick(target) => {
            let at = click_point(editor, target);
            if let Some(id) = editor.double_click(target, at) {
                println!("Editing node {id}: use text/notes/color/icon to change it.");
            }
        }
        Command::Edit(edit) => {
            editor.edit_selected(edit);
        }
        Command::Title(title) => {
            editor.set_title(&title);
        }
        Command::Connect(source, target) => {
            editor.connect(source, target);
        }
        Command::Drag(id, delta) => {
            let Some(node) = editor.map().find_node(id) else {
                bail!("node {id} does not exist");
            };
            let start = editor.viewport().model_to_screen(node.position());
            editor.pointer_down(Some(id), start);
            editor.pointer_move(start + delta);
            editor.pointer_up();
        }
        Command::Pan(delta) => {
            editor.pan_by(delta);
            return Ok(false);
        }
        Command::Wheel(input) => {
            editor.wheel(input);
            println!("zoom {}%", editor.viewport().zoom_percent());
            return Ok(false);
        }
        Command::Show => return Ok(true),
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&editor.status())?);
            return Ok(false);
        }
        Command::Summary => {
            print!("{}", editor.summary().to_text());
            return Ok(false);
        }
        Command::Flashcards => {
            for (index, card) in editor.flashcards().iter().enumerate() {
                println!("{}. {}\n   {}", index + 1, card.front, card.back);
            }
            return Ok(false);
        }
        Command::Export(format, path) => {
            if let Some((name, bytes)) = editor.export(format) {
                let dest = parse_output(path.as_deref(), name)?;
                write_output(dest, &bytes, false)?;
            }
            return Ok(false);
        }
        Command::Set(key, value) => {
            let mut settings = editor.settings().clone();
            match key.as_str() {
                "theme" => settings.theme = value.parse::<Theme>().map_err(|err| anyhow!(err))?,
                "autosave" => settings.autosave = parse_switch(&value)?,
                "snap" | "snap-to-grid" => settings.snap_to_grid = parse_switch(&value)?,
                "auto-expand" => settings.auto_expand = parse_switch(&value)?,
                other => bail!("unknown setting '{other}'"),
            }
            editor.update_settings(settings);
            return Ok(false);
        }
        Command::Help => {
            println!("{HELP}");
            return Ok(false);
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Screen point to click at: the node's own position, or the canvas middle.
fn click_point(editor: &Editor, target: Option<NodeId>) -> Point {
    let viewport = editor.viewport();
    target
        .and_then(|id| editor.map().find_node(id))
        .map(|node| viewport.model_to_screen(node.position()))
        .unwrap_or_else(|| viewport.center())
}

fn print_notices(editor: &mut Editor, to_stderr: bool) {
    for Notice { level, message } in editor.drain_notices() {
        let tag = match level {
            NoticeLevel::Success => "\u{001b}[32mok\u{001b}[0m",
            NoticeLevel::Info => "\u{001b}[36minfo\u{001b}[0m",
            NoticeLevel::Warning => "\u{001b}[33mwarning\u{001b}[0m",
            NoticeLevel::Error => "\u{001b}[31merror\u{001b}[0m",
        };
        if to_stderr || level == NoticeLevel::Error {
            eprintln!("{tag}: {message}");
        } else {
            println!("{tag}: {message}");
        }
    }
}

/// Indented tree of the visible nodes, followed by free-standing ones.
fn outline(map: &MindMap, selected: Option<NodeId>) -> Result<String> {
    let hidden = visibility::hidden_ids(map);
    let mut out = String::new();
    writeln!(out, "{}", map.title)?;

    let mut listed = HashSet::new();
    let free = map
        .nodes
        .iter()
        .filter(|node| !node.is_root && map.find_parent(node.id).is_none());
    let mut stack: Vec<(NodeId, usize)> = map
        .root()
        .into_iter()
        .chain(free)
        .map(|node| (node.id, 0))
        .collect();
    stack.reverse();

    while let Some((id, depth)) = stack.pop() {
        if hidden.contains(&id) || !listed.insert(id) {
            continue;
        }
        let Some(node) = map.find_node(id) else {
            continue;
        };
        let marker = match (node.has_children(), node.is_collapsed) {
            (true, true) => "[+]",
            (true, false) => "[-]",
            (false, _) => "   ",
        };
        let cursor = if selected == Some(id) { ">" } else { " " };
        let free_tag = if depth == 0 && !node.is_root { " (free)" } else { "" };
        writeln!(
            out,
            "{cursor}{}{marker} {} #{}{free_tag}",
            "  ".repeat(depth),
            node.text,
            node.id
        )?;
        if !node.is_collapsed {
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
    }
    Ok(out)
}
