use asm::{error::Error, util, Assembler};
use color_print::cprintln;
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input assembly file
    input: String,

    /// Output hex file
    output: String,

    /// Print address / machine code / source listing
    #[clap(short, long)]
    listing: bool,
}

fn main() -> ExitCode {
    use clap::Parser;

    let args: Args = Args::parse();
    println!("Assembler for the 32-bit RISC target");

    println!("1. Read file and run pass 1");
    println!("  < {}", args.input);
    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(err) => {
            let err = Error::FileOpen(args.input.clone(), err);
            cprintln!("<red,bold>error</>: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let lines: Vec<String> = source.lines().map(String::from).collect();

    let mut asm = Assembler::new();
    let result = asm.pass1(&source).and_then(|()| {
        println!("2. Resolve pending references (pass 2)");
        println!("  - {} pending", asm.relocs.len());
        asm.pass2()
    });

    for warn in &asm.warnings {
        warn.print(&args.input, &lines);
    }
    if let Err(errors) = result {
        for err in &errors {
            err.print(&args.input, &lines);
        }
        cprintln!("<red,bold>assembly failed</>: {} error(s)", errors.len());
        return ExitCode::FAILURE;
    }

    if args.listing {
        util::print_listing(&asm, &lines);
    }

    println!("3. Write hex output");
    println!("  > {}", args.output);
    if let Err(err) = std::fs::write(&args.output, asm.hex()) {
        let err = Error::FileWrite(args.output.clone(), err);
        cprintln!("<red,bold>error</>: {}", err);
        return ExitCode::FAILURE;
    }

    println!(
        "{} instructions, {} data words, {} labels",
        asm.insts.len(),
        asm.data.len(),
        asm.labels.len()
    );
    ExitCode::SUCCESS
}
