use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use colored::Colorize;

use flip::error::Diagnostic;
use flip::session::{self, Session, Stage};

#[derive(ClapParser)]
#[command(name = "flip", about = "The flip language compiler and interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a flip file
    Run { file: String },
    /// Compile only, reporting the first error if any
    Check { file: String },
    /// Print the generated C code
    Emit { file: String },
    /// Print an intermediate compiler stage
    Dump {
        file: String,
        #[arg(long, value_enum, default_value_t = DumpStage::Refcount)]
        stage: DumpStage,
    },
    /// Step through a program interactively
    Debug { file: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpStage {
    Typed,
    Anf,
    Reuse,
    Refcount,
}

impl From<DumpStage> for Stage {
    fn from(stage: DumpStage) -> Self {
        match stage {
            DumpStage::Typed => Stage::Typed,
            DumpStage::Anf => Stage::Anf,
            DumpStage::Reuse => Stage::Reuse,
            DumpStage::Refcount => Stage::RefCount,
        }
    }
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), format!("cannot open '{}': {}", path, err));
            process::exit(1);
        }
    }
}

fn report(diag: &Diagnostic) -> ! {
    eprintln!("{} {}", "error:".red().bold(), diag);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file } => {
            let source = read_file(&file);
            let mut session = Session::new();
            if let Err(diag) = session.start(&source) {
                report(&diag);
            }
            if let Err(diag) = session.run_to_completion() {
                report(&diag);
            }
            let output = session.output();
            if !output.is_empty() {
                println!("{}", output);
            }
        }

        Commands::Check { file } => {
            let source = read_file(&file);
            match session::compile(&source) {
                Ok(_) => println!("{}", "ok".green()),
                Err(diag) => report(&diag),
            }
        }

        Commands::Emit { file } => {
            let source = read_file(&file);
            match session::compile(&source) {
                Ok(compiled) => println!("{}", compiled.generated_code()),
                Err(diag) => report(&diag),
            }
        }

        Commands::Dump { file, stage } => {
            let source = read_file(&file);
            match session::compile(&source) {
                Ok(compiled) => println!("{}", compiled.intermediate_dump(stage.into())),
                Err(diag) => report(&diag),
            }
        }

        Commands::Debug { file } => {
            let source = read_file(&file);
            let mut session = Session::new();
            if let Err(diag) = session.start(&source) {
                report(&diag);
            }
            debug_loop(&mut session);
        }
    }
}

fn debug_loop(session: &mut Session) {
    println!(
        "{}",
        "commands: s(tep), b(ack), m(emory op), r(eturn), c(ontinue), p(rint), q(uit)".dimmed()
    );
    let stdin = io::stdin();
    loop {
        print!("{} ", ">".cyan());
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() {
            break;
        }
        let result = match line.trim() {
            "s" | "step" => session.step_forward(),
            "b" | "back" => session.step_back(),
            "m" | "mem" => session.run_until_next_mutation(),
            "r" | "ret" => session.run_until_return(),
            "c" | "continue" => session.run_to_completion(),
            "p" | "print" => session.state_dump(),
            "q" | "quit" | "" => break,
            other => {
                eprintln!("{} unknown command '{}'", "?".yellow(), other);
                continue;
            }
        };
        match result {
            Ok(dump) => println!("{}", dump),
            Err(diag) => {
                eprintln!("{} {}", "error:".red().bold(), diag);
                break;
            }
        }
        if session.is_done() {
            let output = session.output();
            if !output.is_empty() {
                println!("{}", output);
            }
            println!("{}", "program finished".green());
        }
    }
}
