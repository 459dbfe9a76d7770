use clap::{arg,crate_version,Command};
use std::io::{Read,Write};
use alzw::lzw;

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();

    let long_help =
"Examples:
---------
Compress:      `alzw compress -i my_expanded -o my_compressed -m 14 -p 5000 -e`
Expand:        `alzw expand -i my_compressed -o my_expanded`

When -i or -o is omitted the stream flows through stdin or stdout.";

    let mut main_cmd = Command::new("alzw")
        .about("Compress and expand with adaptive LZW")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --maxbits <BITS> "maximum code width in bits")
            .value_parser(clap::value_parser!(i64).range(1..))
            .required(false)
            .default_value("12"))
        .arg(arg!(-p --window <WINDOW> "prune window in code observations")
            .value_parser(clap::value_parser!(u64).range(1..1 << 24))
            .required(false))
        .arg(arg!(-e --escape "start with an empty table and escape new bytes"))
        .arg(arg!(-i --input <PATH> "input path, stdin if omitted").required(false))
        .arg(arg!(-o --output <PATH> "output path, stdout if omitted").required(false))
        .about("compress a file or stream"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path, stdin if omitted").required(false))
        .arg(arg!(-o --output <PATH> "output path, stdout if omitted").required(false))
        .about("expand a file or stream"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let mut max_bits = *cmd.get_one::<i64>("maxbits").expect(RCH);
        // out of range widths fall back to the standard 12, the header
        // cannot carry more than 24 and a preloaded table needs more than 8
        if max_bits <= 8 || max_bits > 24 {
            max_bits = 12;
        }
        let opt = lzw::Options {
            max_bits: max_bits as usize,
            window: match cmd.get_one::<u64>("window") {
                Some(w) => *w,
                None => 0
            },
            escape: cmd.get_flag("escape")
        };
        let dat = read_all(cmd.get_one::<String>("input"))?;
        let compressed = lzw::compress_slice(&dat,&opt)?;
        write_all(cmd.get_one::<String>("output"),&compressed)?;
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let dat = read_all(cmd.get_one::<String>("input"))?;
        let expanded = lzw::expand_slice(&dat)?;
        write_all(cmd.get_one::<String>("output"),&expanded)?;
    }

    Ok(())
}

fn read_all(path: Option<&String>) -> Result<Vec<u8>,Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut dat = Vec::new();
            std::io::stdin().read_to_end(&mut dat)?;
            Ok(dat)
        }
    }
}

fn write_all(path: Option<&String>,dat: &[u8]) -> Result<(),Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(std::fs::write(path,dat)?),
        None => {
            std::io::stdout().write_all(dat)?;
            Ok(())
        }
    }
}
