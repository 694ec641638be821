//! Incremental terminal rendering of the chat view model.
//!
//! The view model always carries the whole conversation. The renderer keeps
//! track of what it already wrote, so a streaming reply only prints its new
//! tail and the terminal reads like a normal transcript.

use std::io::{self, Write};

use chat_core::{ChatViewModel, MessageView, Role, TurnId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub title: String,
    pub subtitle: String,
    pub placeholder: String,
}

const PROMPT: &str = "> ";

struct Printed {
    id: TurnId,
    content: String,
    closed: bool,
}

pub struct TranscriptRenderer<W: Write> {
    out: W,
    banner: Banner,
    banner_shown: bool,
    printed: Vec<Printed>,
    prompt_shown: bool,
}

impl<W: Write> TranscriptRenderer<W> {
    pub fn new(out: W, banner: Banner) -> Self {
        Self {
            out,
            banner,
            banner_shown: false,
            printed: Vec::new(),
            prompt_shown: false,
        }
    }

    pub fn render(&mut self, view: &ChatViewModel) -> io::Result<()> {
        if !self.banner_shown {
            self.write_banner(view)?;
            self.banner_shown = true;
        }

        let last = view.messages.len().saturating_sub(1);
        for (index, message) in view.messages.iter().enumerate() {
            let streaming = view.is_loading && index == last && message.role == Role::Assistant;
            self.write_message(index, message, view.header, streaming)?;
        }

        if !view.is_loading && !self.prompt_shown {
            write!(self.out, "{PROMPT}")?;
            self.prompt_shown = true;
        }
        self.out.flush()
    }

    /// One-off line outside the transcript, e.g. a refused send.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "! {text}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_banner(&mut self, view: &ChatViewModel) -> io::Result<()> {
        writeln!(self.out, "== {} | {} ==", self.banner.title, view.header)?;
        writeln!(self.out, "{}", self.banner.subtitle)?;
        writeln!(self.out)?;
        writeln!(self.out, "{}: {}", view.header, view.greeting)?;
        writeln!(self.out, "({}  /quit to leave)", self.banner.placeholder)
    }

    fn write_message(
        &mut self,
        index: usize,
        message: &MessageView,
        header: &str,
        streaming: bool,
    ) -> io::Result<()> {
        let speaker = match message.role {
            Role::User => "You",
            Role::Assistant => header,
        };

        if index >= self.printed.len() {
            if self.prompt_shown {
                // The user's line was echoed after the prompt already.
                writeln!(self.out)?;
                self.prompt_shown = false;
            }
            write!(self.out, "{speaker}: ")?;
            self.printed.push(Printed {
                id: message.id,
                content: String::new(),
                closed: false,
            });
        }
        let entry = &mut self.printed[index];
        debug_assert_eq!(entry.id, message.id);
        if entry.closed {
            return Ok(());
        }

        match message.content.strip_prefix(entry.content.as_str()) {
            Some(delta) => write!(self.out, "{delta}")?,
            None => {
                // Replaced rather than extended, e.g. by an error text.
                writeln!(self.out)?;
                write!(self.out, "{speaker}: {}", message.content)?;
            }
        }
        entry.content.clone_from(&message.content);

        if !streaming {
            writeln!(self.out)?;
            if let Some(line) = &message.sources_line {
                writeln!(self.out, "{line}")?;
            }
            entry.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn banner() -> Banner {
        Banner {
            title: "Internal RAG Assistant".to_string(),
            subtitle: "Docs".to_string(),
            placeholder: "Ask away...".to_string(),
        }
    }

    fn message(id: TurnId, role: Role, content: &str, sources: Option<&str>) -> MessageView {
        MessageView {
            id,
            role,
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            sources_line: sources.map(str::to_string),
        }
    }

    fn view(messages: Vec<MessageView>, is_loading: bool) -> ChatViewModel {
        ChatViewModel {
            header: "Assistant RAG",
            greeting: "Hello!",
            messages,
            input: String::new(),
            is_loading,
            can_send: !is_loading,
            dirty: true,
        }
    }

    fn output(renderer: TranscriptRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn first_render_shows_banner_and_prompt() {
        let mut renderer = TranscriptRenderer::new(Vec::new(), banner());
        renderer.render(&view(Vec::new(), false)).unwrap();
        assert_eq!(
            output(renderer),
            "== Internal RAG Assistant | Assistant RAG ==\nDocs\n\n\
             Assistant RAG: Hello!\n(Ask away...  /quit to leave)\n> "
        );
    }

    #[test]
    fn streaming_reply_prints_only_new_text() {
        let mut renderer = TranscriptRenderer::new(Vec::new(), banner());
        renderer.render(&view(Vec::new(), false)).unwrap();

        let user = message(1, Role::User, "hi", None);
        for (content, loading) in [("", true), ("Hel", true), ("Hello", true)] {
            let reply = message(2, Role::Assistant, content, None);
            renderer
                .render(&view(vec![user.clone(), reply], loading))
                .unwrap();
        }
        let done = message(2, Role::Assistant, "Hello", Some("Sources: A, B"));
        renderer.render(&view(vec![user, done], false)).unwrap();

        let text = output(renderer);
        let transcript = text.split_once("> ").unwrap().1;
        assert_eq!(
            transcript,
            "\nYou: hi\nAssistant RAG: Hello\nSources: A, B\n> "
        );
    }

    #[test]
    fn replaced_reply_is_reprinted_on_its_own_line() {
        let mut renderer = TranscriptRenderer::new(Vec::new(), banner());
        let user = message(1, Role::User, "hi", None);
        renderer
            .render(&view(
                vec![user.clone(), message(2, Role::Assistant, "Par", None)],
                true,
            ))
            .unwrap();
        renderer
            .render(&view(
                vec![
                    user,
                    message(2, Role::Assistant, "Network error: connection reset", None),
                ],
                false,
            ))
            .unwrap();

        let text = output(renderer);
        assert!(
            text.ends_with(
                "Assistant RAG: Par\nAssistant RAG: Network error: connection reset\n> "
            ),
            "{text:?}"
        );
    }

    #[test]
    fn notice_is_its_own_line() {
        let mut renderer = TranscriptRenderer::new(Vec::new(), banner());
        renderer.notice("still waiting for the reply").unwrap();
        assert_eq!(output(renderer), "! still waiting for the reply\n");
    }
}
