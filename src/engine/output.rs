/// One host-visible effect, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputBlock {
    Text(String),
    Title {
        title: String,
        subtitle: String,
        fade_in: u32,
        stay: u32,
        fade_out: u32,
    },
    ActionBar(String),
    Sound {
        id: String,
        volume: f32,
        pitch: f32,
    },
    Command(String),
    ConsoleCommand(String),
    Opened {
        menu: String,
        title: String,
        size: usize,
    },
    Closed,
}

#[derive(Default, Debug, Clone)]
pub struct Output {
    pub blocks: Vec<OutputBlock>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(&mut self, s: impl Into<String>) {
        let s = s.into();
        if !s.trim().is_empty() {
            self.blocks.push(OutputBlock::Text(s));
        }
    }

    pub fn push(&mut self, block: OutputBlock) {
        self.blocks.push(block);
    }

    pub fn append(&mut self, other: Output) {
        self.blocks.extend(other.blocks);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All chat lines, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                OutputBlock::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}
