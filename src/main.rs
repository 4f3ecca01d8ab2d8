use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::TryRecvError;

use invmenu::config::{SETTINGS_FILE, Settings};
use invmenu::engine::{
    MainThreadScheduler, Output, OutputBlock, Player, RecordingHost, strip_colors,
};
use invmenu::menu::ItemVisual;
use invmenu::{CommandSender, MenuPlugin};

const TICK: Duration = Duration::from_millis(50);

fn flush_output(out: Output) {
    for block in out.blocks {
        match block {
            OutputBlock::Text(line) => println!("{}", strip_colors(&line)),
            OutputBlock::ActionBar(line) => println!("[action bar] {}", strip_colors(&line)),
            OutputBlock::Title {
                title, subtitle, ..
            } => {
                println!("\n== {} ==", strip_colors(&title));
                if !subtitle.is_empty() {
                    println!("   {}", strip_colors(&subtitle));
                }
            }
            OutputBlock::Sound { id, volume, pitch } => {
                println!("[sound] {} (volume {}, pitch {})", id, volume, pitch)
            }
            OutputBlock::Command(cmd) => println!("[player runs] /{}", cmd),
            OutputBlock::ConsoleCommand(cmd) => println!("[console runs] {}", cmd),
            OutputBlock::Opened { menu, title, size } => {
                println!("\n[opened '{}': {} ({} slots)]", menu, strip_colors(&title), size)
            }
            OutputBlock::Closed => println!("[inventory closed]"),
        }
    }
}

fn flush_host(host: &RecordingHost, player: &Player) {
    flush_output(host.take_output(player));
    flush_output(host.take_console_output());
}

fn print_view(host: &RecordingHost, player: &Player) {
    let Some(view) = host.open_view(player) else {
        println!("{} has no menu open.", player.name);
        return;
    };
    println!(
        "{} ({:?}, {} slots)",
        strip_colors(&view.title),
        view.kind,
        view.size
    );
    for (slot, item) in &view.slots {
        let name = item
            .name
            .as_deref()
            .map(strip_colors)
            .unwrap_or_else(|| item.material.clone());
        println!("  [{:>2}] {} x{} ({})", slot, name, item.amount, item.material);
        for line in &item.lore {
            println!("         {}", strip_colors(line));
        }
    }
}

fn print_help() {
    println!("Player commands:");
    println!("  as <name>            switch the current player");
    println!("  click <slot>         click a slot in the open menu");
    println!("  close                close the open menu");
    println!("  view                 show the open menu");
    println!("  chat <message>       say something in chat");
    println!("  /<command>           run a player command");
    println!("  use <material> [name] use a held item");
    println!("  grant|revoke <perm>  change the current player's permissions");
    println!("  set <key> <value>    set a %placeholder% for the current player");
    println!("Admin commands:");
    println!("  menu <args>          run as the current player (open, reload, list, serve, help)");
    println!("  console <args>       run from the console");
    println!("  quit");
}

/// Read stdin on its own thread so the main loop can keep ticking.
fn spawn_input() -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn main() -> io::Result<()> {
    let data_dir: PathBuf = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("plugin-data"));

    let debug = Settings::load(&data_dir.join(SETTINGS_FILE)).is_ok_and(|s| s.debug);
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let scheduler = MainThreadScheduler::new();
    let host = RecordingHost::new();
    let mut plugin = match MenuPlugin::start(data_dir.clone(), host.clone(), scheduler.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to start with data dir '{}': {e}", data_dir.display());
            std::process::exit(1);
        }
    };
    let engine = Arc::clone(plugin.engine());

    println!("Using data directory: {}", data_dir.display());
    println!("Type 'help' for commands, 'quit' to exit.\n");

    let mut player = Player::named("Steve");
    let lines = spawn_input();

    print!("{}> ", player.name);
    io::stdout().flush()?;

    loop {
        let input = match lines.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => {
                // Queued work from the watcher, lookups and deferred opens.
                if scheduler.run_pending_timeout(TICK) > 0 {
                    flush_host(&host, &player);
                }
                continue;
            }
            Err(TryRecvError::Disconnected) => {
                println!("\nGoodbye.");
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            print!("{}> ", player.name);
            io::stdout().flush()?;
            continue;
        }

        let mut parts = input.splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();
        let mut out = Output::new();

        if verb.eq_ignore_ascii_case("quit") || verb.eq_ignore_ascii_case("exit") {
            plugin.shutdown();
            println!("Goodbye.");
            break;
        } else if verb.eq_ignore_ascii_case("help") {
            print_help();
        } else if verb.eq_ignore_ascii_case("as") {
            if rest.is_empty() {
                out.say("As whom?");
            } else {
                player = Player::named(rest);
            }
        } else if verb.eq_ignore_ascii_case("click") {
            match rest.parse::<usize>() {
                Ok(slot) => match engine.open_view_of(&player) {
                    Some(menu) => engine.on_click(&menu.name, slot, &player),
                    None => out.say("No menu is open."),
                },
                Err(_) => out.say("Click which slot?"),
            }
        } else if verb.eq_ignore_ascii_case("close") {
            engine.on_close(&player);
        } else if verb.eq_ignore_ascii_case("view") {
            print_view(&host, &player);
        } else if verb.eq_ignore_ascii_case("chat") {
            if !engine.on_chat(&player, rest) {
                out.say(format!("<{}> {}", player.name, rest));
            }
        } else if let Some(command) = input.strip_prefix('/') {
            if !engine.on_command(&player, command) {
                out.say("Unknown command.");
            }
        } else if verb.eq_ignore_ascii_case("use") {
            let mut held = rest.splitn(2, char::is_whitespace);
            match held.next().filter(|m| !m.is_empty()) {
                Some(material) => {
                    let mut item = ItemVisual::of(material.to_uppercase());
                    item.name = held.next().map(str::to_string);
                    if !engine.on_interact(&player, &item) {
                        out.say("Nothing happens.");
                    }
                }
                None => out.say("Use what?"),
            }
        } else if verb.eq_ignore_ascii_case("grant") {
            host.grant(&player, rest);
            out.say(format!("Granted {} to {}.", rest, player.name));
        } else if verb.eq_ignore_ascii_case("revoke") {
            host.revoke(&player, rest);
            out.say(format!("Revoked {} from {}.", rest, player.name));
        } else if verb.eq_ignore_ascii_case("set") {
            match rest.split_once(char::is_whitespace) {
                Some((key, value)) => host.set_placeholder(&player, key, value.trim()),
                None => out.say("Set what to what?"),
            }
        } else if verb.eq_ignore_ascii_case("menu") {
            out.append(plugin.step(&CommandSender::Player(player.clone()), rest));
        } else if verb.eq_ignore_ascii_case("console") {
            out.append(plugin.step(&CommandSender::Console, rest));
        } else {
            out.say("I don't understand that command. Try 'help'.");
        }

        // Give off-thread lookups a moment to post back before printing.
        scheduler.run_pending_timeout(TICK);
        flush_output(out);
        flush_host(&host, &player);

        print!("{}> ", player.name);
        io::stdout().flush()?;
    }

    Ok(())
}
