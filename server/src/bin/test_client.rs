use clap::Parser;
use maze_shared::{Command, Frame};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plain-text maze client for manual testing", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name sent on connect
    #[arg(short, long, default_value = "tester")]
    name: String,
}

fn print_frame(frame: &Frame) {
    match frame {
        Frame::Adjacent { position, .. } => {
            println!("Around you at ({}, {}):", position.row, position.col);
        }
        Frame::Fogged {
            width,
            height,
            position,
            ..
        } => {
            println!(
                "Map {}x{}, you are at ({}, {}):",
                width, height, position.row, position.col
            );
        }
        Frame::ExitFound => println!("You found an exit!"),
        Frame::SessionOver => println!("Session over, waiting for the result..."),
        Frame::Won => println!("You won!"),
        Frame::Lost => println!("You lost."),
    }
    if let Some(text) = frame.render_text() {
        print!("{}", text);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    stream.write_all(format!("{}\n", args.name).as_bytes()).await?;
    println!("Joined as {}, waiting for the lobby to fill", args.name);
    println!("Move with W/A/S/D, leave with exit");

    let (mut reader, mut writer) = stream.into_split();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    let mut stdin_open = true;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    println!("Server closed the connection");
                    return Ok(());
                }
                received.extend_from_slice(&buf[..n]);

                while let Some((frame, used)) = Frame::decode(&received)? {
                    received.drain(..used);
                    print_frame(&frame);
                    if matches!(frame, Frame::Won | Frame::Lost) {
                        return Ok(());
                    }
                }
            }

            line = stdin.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    writer.shutdown().await?;
                    continue;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let message = match Command::parse(line) {
                    Some(command) => command.as_str(),
                    None => {
                        println!("Unknown command {:?}, sending anyway", line);
                        line
                    }
                };
                writer.write_all(format!("{}\n", message).as_bytes()).await?;
            }
        }
    }
}
