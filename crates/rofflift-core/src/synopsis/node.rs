//! Parse tree for command synopses.

/// How an element participates in the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Plain,
    Req,
    Opt,
}

impl Choice {
    fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Req => "req",
            Self::Opt => "opt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Option,
    Replaceable,
    /// A bracketed sequence.
    Arg,
    /// Alternatives separated by `|`.
    Group,
    /// Text that binds two elements without a space, such as `=`.
    Glue,
    /// Shell redirection (`<`, `>`, `>>`, `2>`).
    Redirect,
    /// Forced line break.
    Sbr,
    Newline,
    /// Anything else, passed through as text.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    pub kind: NodeKind,
    /// Source token (escaped text); empty for containers.
    pub token: String,
    pub choice: Choice,
    pub repeat: bool,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn leaf(kind: NodeKind, token: impl Into<String>) -> Self {
        Self {
            kind,
            token: token.into(),
            choice: Choice::Plain,
            repeat: false,
            children: Vec::new(),
        }
    }

    pub fn container(kind: NodeKind, choice: Choice, children: Vec<ParseNode>) -> Self {
        Self {
            kind,
            token: String::new(),
            choice,
            repeat: false,
            children,
        }
    }

    /// Classify a bare word from a synopsis line.
    pub fn word(token: &str) -> Self {
        let is_redirect = matches!(
            token,
            "&lt;" | "&gt;" | "&gt;&gt;" | "2&gt;" | "2&gt;&amp;1" | "&lt;&lt;" | "|&amp;"
        );
        if is_redirect {
            return Self::leaf(NodeKind::Redirect, token);
        }
        let is_option = token.len() > 1
            && (token.starts_with('-') || token.starts_with('+'))
            && token[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '?' || c == '#');
        if is_option {
            return Self::leaf(NodeKind::Option, token);
        }
        if token.chars().all(|c| !c.is_alphanumeric()) {
            return Self::leaf(NodeKind::Generic, token);
        }
        Self::leaf(NodeKind::Replaceable, token)
    }

    fn attrs(&self) -> String {
        let mut attrs = format!(" choice='{}'", self.choice.as_str());
        if self.repeat {
            attrs.push_str(" rep='repeat'");
        }
        attrs
    }

    /// Markup for this node inside an `arg`.
    fn inline_markup(&self) -> String {
        match self.kind {
            NodeKind::Option => match self.token.split_once('=') {
                Some((option, value)) if !value.is_empty() => {
                    format!("<option>{option}=</option><replaceable>{value}</replaceable>")
                }
                _ => format!("<option>{}</option>", self.token),
            },
            NodeKind::Replaceable => format!("<replaceable>{}</replaceable>", self.token),
            NodeKind::Arg | NodeKind::Group => self.markup(),
            NodeKind::Sbr => "<sbr/>".to_owned(),
            NodeKind::Newline => String::new(),
            NodeKind::Glue | NodeKind::Redirect | NodeKind::Generic => self.token.clone(),
        }
    }

    /// Markup for this node as a direct child of `cmdsynopsis` or `group`.
    pub fn markup(&self) -> String {
        match self.kind {
            NodeKind::Arg => {
                let inner: Vec<String> = self
                    .children
                    .iter()
                    .map(ParseNode::inline_markup)
                    .filter(|m| !m.is_empty())
                    .collect();
                format!("<arg{}>{}</arg>", self.attrs(), inner.join(" "))
            }
            NodeKind::Group => {
                let inner: String = self.children.iter().map(ParseNode::markup).collect();
                format!("<group{}>{inner}</group>", self.attrs())
            }
            NodeKind::Sbr => "<sbr/>".to_owned(),
            NodeKind::Newline => String::new(),
            _ => {
                let rep = if self.repeat { " rep='repeat'" } else { "" };
                format!("<arg choice='plain'{rep}>{}</arg>", self.inline_markup())
            }
        }
    }
}
