//! Headless driver: reads commands from stdin and pumps the messaging client.

use std::path::PathBuf;

#[cfg(not(feature = "coverage"))]
use std::path::Path;
#[cfg(not(feature = "coverage"))]
use std::sync::mpsc::{self, Receiver, TryRecvError};
#[cfg(not(feature = "coverage"))]
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::api::ApiError;
use crate::forms::registration::{RegistrationForm, Role};
use crate::forms::ValidationError;
#[cfg(not(feature = "coverage"))]
use crate::api::ApiClient;
#[cfg(not(feature = "coverage"))]
use crate::forms::files::SelectedFile;
#[cfg(not(feature = "coverage"))]
use crate::forms::FieldErrors;
#[cfg(not(feature = "coverage"))]
use crate::messaging::{ClientEvent, MessagingClient, MessagingConfig};
#[cfg(not(feature = "coverage"))]
use crate::notify::Page;
use crate::transport::errors::TransportError;
use crate::transport::types::ConversationId;
#[cfg(not(feature = "coverage"))]
use crate::upload::send_attachment;

pub const QUICK_REPLIES: [&str; 7] = [
    "When are you available?",
    "Can you show a photo?",
    "What's your rate?",
    "How long will this take?",
    "Can you provide an estimate?",
    "I need this urgently",
    "Thanks for your help!",
];

/// Quick replies are numbered from 1.
pub fn quick_reply(number: usize) -> Option<&'static str> {
    number
        .checked_sub(1)
        .and_then(|index| QUICK_REPLIES.get(index))
        .copied()
}

#[cfg(not(feature = "coverage"))]
const IDLE_SLEEP: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Join(ConversationId),
    Read,
    Attach(PathBuf),
    Search(String),
    Start(u64),
    Reply(Option<usize>),
    Register(RegistrationForm),
    Quit,
    Say(String),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };
        let (name, argument) = rest.split_once(' ').unwrap_or((rest, ""));
        let argument = argument.trim();
        match name {
            "join" => argument
                .parse()
                .map(|id| Command::Join(ConversationId(id)))
                .unwrap_or_else(|_| Command::Unknown(line.to_string())),
            "read" => Command::Read,
            "attach" if !argument.is_empty() => Command::Attach(PathBuf::from(argument)),
            "search" => Command::Search(argument.to_string()),
            "start" => argument
                .parse()
                .map(Command::Start)
                .unwrap_or_else(|_| Command::Unknown(line.to_string())),
            "reply" if argument.is_empty() => Command::Reply(None),
            "reply" => argument
                .parse()
                .map(|number| Command::Reply(Some(number)))
                .unwrap_or_else(|_| Command::Unknown(line.to_string())),
            "register" => parse_registration(argument)
                .map(Command::Register)
                .unwrap_or_else(|| Command::Unknown(line.to_string())),
            "quit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// `<client|professional> <username> <email> <password> <confirm> <full name...>`
fn parse_registration(argument: &str) -> Option<RegistrationForm> {
    let mut words = argument.split_whitespace();
    let role = match words.next()? {
        "client" => Role::Client,
        "professional" => Role::Professional,
        _ => return None,
    };
    let username = words.next()?.to_string();
    let email = words.next()?.to_string();
    let password = words.next()?.to_string();
    let confirm_password = words.next()?.to_string();
    let full_name = words.collect::<Vec<_>>().join(" ");
    if full_name.is_empty() {
        return None;
    }
    Some(RegistrationForm {
        role,
        full_name,
        username,
        email,
        password,
        confirm_password,
    })
}

#[cfg(not(feature = "coverage"))]
fn spawn_stdin() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

#[cfg(not(feature = "coverage"))]
fn describe(event: &ClientEvent) -> String {
    match event {
        ClientEvent::ConnectionState(state) => format!("[connection] {state:?}"),
        ClientEvent::Error(message) => format!("[error] {message}"),
        ClientEvent::Notification(text) => format!("[notice] {text}"),
        ClientEvent::ConversationNotification(message) => {
            format!("[notice] New message from {}", message.sender_name)
        }
        ClientEvent::Message(message) => format!("{}: {}", message.sender_name, message.content),
        ClientEvent::Typing(notice) => format!("{} is typing...", notice.typing_user),
        ClientEvent::ReadReceipt(receipt) => {
            format!("[read by {}]", receipt.read_by_user_id)
        }
    }
}

#[cfg(not(feature = "coverage"))]
struct Session {
    client: MessagingClient,
    api: ApiClient,
    page: Page,
    draft: String,
}

#[cfg(not(feature = "coverage"))]
impl Session {
    /// Returns false when the user asked to quit.
    fn handle(&mut self, command: Command, now: Instant) -> bool {
        let outcome: Result<(), AppError> = match command {
            Command::Join(conversation) => self.join(conversation),
            Command::Read => match self.client.current_conversation() {
                Some(conversation) => self.client.mark_as_read(conversation).map_err(Into::into),
                None => Ok(()),
            },
            Command::Attach(path) => {
                self.attach(&path);
                Ok(())
            }
            Command::Search(query) => self.search(&query),
            Command::Start(professional) => self
                .api
                .start_conversation(professional)
                .map_err(AppError::from)
                .and_then(|conversation| self.join(conversation)),
            Command::Reply(None) => {
                for (number, reply) in QUICK_REPLIES.iter().enumerate() {
                    println!("{}. {reply}", number + 1);
                }
                Ok(())
            }
            Command::Reply(Some(number)) => {
                match quick_reply(number) {
                    Some(reply) => {
                        self.draft = reply.to_string();
                        println!("draft: {reply} (empty line sends)");
                    }
                    None => println!("no quick reply {number}"),
                }
                Ok(())
            }
            Command::Register(form) => self.register(&form, now),
            Command::Quit => return false,
            Command::Say(text) => self.say(text, now),
            Command::Unknown(line) => {
                println!("unknown command: {line}");
                Ok(())
            }
        };
        if let Err(error) = outcome {
            log::warn!("{error}");
            self.page.board.error(error.to_string(), now);
        }
        true
    }

    /// An empty line sends the pending draft.
    fn say(&mut self, text: String, now: Instant) -> Result<(), AppError> {
        let text = if text.trim().is_empty() {
            std::mem::take(&mut self.draft)
        } else {
            text
        };
        self.client.on_input(now)?;
        self.client.send_current(&text)?;
        Ok(())
    }

    fn register(&mut self, form: &RegistrationForm, now: Instant) -> Result<(), AppError> {
        let request = form.prepare(&mut FieldErrors::new())?;
        let response = self.api.register(form.role, &request)?;
        let message = response.outcome().map_err(ApiError::Rejected)?;
        println!("{message}");
        self.page.board.toast(message, now);
        Ok(())
    }

    fn join(&mut self, conversation: ConversationId) -> Result<(), AppError> {
        self.client.subscribe_to_conversation(conversation)?;
        self.page.chat.clear();
        self.client.mark_as_read(conversation)?;
        Ok(())
    }

    fn attach(&mut self, path: &Path) {
        let Some(conversation) = self.client.current_conversation() else {
            println!("join a conversation first");
            return;
        };
        let (file, bytes) = match SelectedFile::load(path) {
            Ok(loaded) => loaded,
            Err(error) => {
                self.client
                    .report_error(format!("Cannot read {}: {error}", path.display()));
                return;
            }
        };
        if let Err(error) = send_attachment(&mut self.client, &mut self.api, conversation, &file, bytes)
        {
            log::warn!("attachment failed: {error}");
        }
    }

    fn search(&mut self, query: &str) -> Result<(), AppError> {
        let results = self.api.search_professionals(query)?;
        if results.is_empty() {
            println!("No professionals found");
        }
        for professional in results {
            println!("#{} {} ({})", professional.id, professional.name, professional.category);
        }
        Ok(())
    }

    fn pump(&mut self, now: Instant) {
        if let Err(error) = self.client.poll(now) {
            log::warn!("poll failed: {error}");
        }
        self.client.tick(now);
        for event in self.client.take_events() {
            println!("{}", describe(&event));
            self.page.apply(event, now);
        }
        for notice in self.page.expire(now) {
            log::debug!("notice {} expired", notice.id);
        }
    }
}

#[cfg(not(feature = "coverage"))]
pub fn run(config_path: &Path) -> Result<(), AppError> {
    let config = MessagingConfig::load(config_path)?;
    let api = ApiClient::new(&config.api_base_url)?;
    let page = Page::from_config(&config);
    let client = MessagingClient::new_with_socket(config);
    let mut session = Session {
        client,
        api,
        page,
        draft: String::new(),
    };

    if let Err(error) = session.client.connect(Instant::now()) {
        log::warn!("initial connect failed: {error}");
    }

    let commands = spawn_stdin();
    loop {
        let now = Instant::now();
        match commands.try_recv() {
            Ok(line) => {
                if !session.handle(Command::parse(&line), now) {
                    break;
                }
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }
        session.pump(now);
        if !session.client.is_connected() {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    session.client.disconnect();
    Ok(())
}
