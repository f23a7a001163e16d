// src/core/commands/table.rs

//! The ordered command table and token resolution.
//!
//! Order matters: the first definition whose name and scope match wins, so a
//! narrower entry placed early shadows a more general one further down.

use super::place::Place;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Anywhere,
    /// Only fires in the home channel; elsewhere the token is treated as unknown.
    HomeOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reply(&'static str),
    /// Several chat lines, sent in order.
    ReplyLines(&'static [&'static str]),
    /// A reply where `{user}` is replaced by the speaker's name.
    Template(&'static str),
    /// Resolve as if the user had typed this token instead.
    Alias(&'static str),
    UserLookup,
    LatestRun,
    UpCheck,
    Timeout,
    EnableTimeout,
    DisableTimeout,
    Relay,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CommandDef {
    pub names: &'static [&'static str],
    pub scope: Scope,
    pub action: Action,
}

impl CommandDef {
    /// The name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    fn matches(&self, token: &str, in_home: bool) -> bool {
        self.names.contains(&token) && (self.scope == Scope::Anywhere || in_home)
    }
}

const fn def(names: &'static [&'static str], scope: Scope, action: Action) -> CommandDef {
    CommandDef {
        names,
        scope,
        action,
    }
}

use Action::*;
use Scope::*;

pub static COMMANDS: &[CommandDef] = &[
    def(
        &["bot", "help"],
        HomeOnly,
        Reply("I am a Twitch bot written in Rust by ComplexPlane. For a full list of commands: https://git.io/fj2gV"),
    ),
    def(
        &["complexplanebot"],
        Anywhere,
        Reply("I am a Twitch bot written in Rust by ComplexPlane. For a full list of commands: https://git.io/fj2gV"),
    ),
    def(&["wr"], Anywhere, Alias("1st")),
    def(
        &["social", "links"],
        HomeOnly,
        Reply(
            "Twitter: https://twitter.com/ComplexPlaneRun   \
             Discord: https://discord.gg/nJWndP5   \
             Youtube: https://bit.ly/2GbXGlD   \
             Speedrun.com: https://bit.ly/2NSTbCI   \
             Monkey Ball Community Discord: https://discord.gg/4TVgGkx   \
             Monkey Ball RTA-Focused Discord: https://discord.gg/N8N8Njc",
        ),
    ),
    def(&["schedule"], HomeOnly, Reply("I don't have a schedule currently.")),
    def(&["twitter"], HomeOnly, Reply("Twitter: https://twitter.com/ComplexPlaneRun")),
    def(
        &["discord"],
        HomeOnly,
        Reply("I might want to have a discord eventually, but I haven't thought of any good channels and stuff for it yet."),
    ),
    def(&["src"], HomeOnly, Reply("Speedrun.com: https://www.speedrun.com/user/ComplexPlane")),
    def(&["gaming"], HomeOnly, Reply("https://clips.twitch.tv/YummyTenuousMouseCharlieBitMe")),
    def(&["slideintodms"], HomeOnly, Template("/w {user} heyyy ;)")),
    def(&["rank"], Anywhere, UserLookup),
    def(&["latest"], Anywhere, LatestRun),
    def(&["issrcdown"], Anywhere, UpCheck),
    def(
        &["pausing"],
        Anywhere,
        ReplyLines(&[
            "Pause strats are a way to perform perfectly precise movement on a stage. In Monkey Ball, there is zero RNG; if we provide exactly the same inputs on the control stick on exactly the same frames on a level, exactly the same thing will happen. To perform a pause strat, you hold the control stick in an exact direction (thanks to the Gamecube controller's notches), pause on a specific frame (using the timer as a reference), and repeat.",
            "Often we will pause slightly before the intended frame and then press B quickly followed by Pause to advance a small number of frames until the desired frame is reached. Pausing quickly and frame-perfectly is tricky to do consistently, so many pause strats include \"backup frames\" as well.",
        ]),
    ),
    def(
        &["boosting"],
        Anywhere,
        Reply("Switching between up-left and up-right can change your momentum in certain circumstances. Boosting once at the start of a level (\"frame boosting\") or into angled walls (\"wall boosting\") can give you a speed boost. Boosting in mid-air can keep you in the air for slightly longer (\"air boosting\")."),
    ),
    def(
        &["firstframe"],
        Anywhere,
        Reply("The game does not consider the stage completed until the third frame after breaking the goaltape. Leaving the stage with \"Stage Select\" on the first two frames results in a \"first frame\"."),
    ),
    def(
        &["walls"],
        Anywhere,
        Reply("For many kinds of walls, wall boosting gives an inconsistent amount of speed. Sometimes you can smoothly roll off of them, sometimes you can just bonk and gain less speed. This inconsistency can make certain strats not RTA-viable."),
    ),
    def(&["alisters"], Anywhere, Reply("Alisters Discord: https://discord.gg/N8N8Njc")),
    def(
        &["smh"],
        HomeOnly,
        Template("Hi, my name is {user} and you should follow me at twitch.tv/{user}  I'm an epic speedrunner and MUCH better than this lowly gamer!!"),
    ),
    def(&["timeout"], HomeOnly, Timeout),
    def(&["enabletimeout"], HomeOnly, EnableTimeout),
    def(&["disabletimeout"], HomeOnly, DisableTimeout),
    def(&["msg"], HomeOnly, Relay),
    def(&["surgery"], HomeOnly, Reply("https://www.youtube.com/watch?v=DywNCzt_ky8")),
];

/// What a command token turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Command(&'static CommandDef),
    /// A place shorthand such as `3rd`.
    Place(Place),
    Unrecognized,
}

fn lookup(token: &str, in_home: bool) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|d| d.matches(token, in_home))
}

/// Resolves a command token. Aliases are followed exactly once.
pub fn resolve(token: &str, in_home: bool) -> Resolved {
    let mut token = token;
    if let Some(found) = lookup(token, in_home) {
        let Action::Alias(target) = found.action else {
            return Resolved::Command(found);
        };
        token = target;
        if let Some(aliased) = lookup(token, in_home)
            && !matches!(aliased.action, Action::Alias(_))
        {
            return Resolved::Command(aliased);
        }
    }
    match Place::parse(token) {
        Some(place) => Resolved::Place(place),
        None => Resolved::Unrecognized,
    }
}

/// Splits `!token rest` into the token and the trimmed rest.
pub fn parse_command(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_prefix('!')?;
    let (token, args) = body.split_once(' ').unwrap_or((body, ""));
    if token.is_empty() {
        return None;
    }
    Some((token, args.trim()))
}
