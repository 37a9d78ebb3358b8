//! Protocol constant tables
//!
//! The numeric values below are fixed by the game client and must match it
//! byte for byte.

/// Client id of the placeholder player used by the join bootstrap.
pub const PLACEHOLDER_CLIENT_ID: i32 = i32::MAX - 1;

/// Owner id of global objects spawned by the host.
pub const GLOBAL_OWNER_ID: i32 = -2;

/// Owner id meaning "whoever sent this spawn".
pub const CURRENT_CLIENT_ID: i32 = -3;

/// Handle value of an object that is not (or no longer) registered.
pub const INVALID_HANDLE: u32 = u32::MAX;

/// Scene the placeholder player announces during the join bootstrap.
pub const ONLINE_GAME_SCENE: &str = "OnlineGame";

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

wire_enum! {
    /// Tags of root messages
    pub enum MessageFlag {
        HostGame = 0,
        JoinGame = 1,
        StartGame = 2,
        RemoveGame = 3,
        RemovePlayer = 4,
        GameData = 5,
        GameDataTo = 6,
        JoinedGame = 7,
        EndGame = 8,
        AlterGame = 10,
        KickPlayer = 11,
        WaitForHost = 12,
    }
}

wire_enum! {
    /// Tags of the sub-messages inside a GameData payload
    pub enum GameDataTag {
        DataFlag = 1,
        RpcFlag = 2,
        SpawnFlag = 4,
        DespawnFlag = 5,
        SceneChangeFlag = 6,
        ReadyFlag = 7,
        ChangeSettingsFlag = 8,
    }
}

wire_enum! {
    /// Remote procedure call ids
    pub enum RpcCall {
        PlayAnimation = 0,
        CompleteTask = 1,
        SyncSettings = 2,
        SetInfected = 3,
        Exiled = 4,
        CheckName = 5,
        SetName = 6,
        CheckColor = 7,
        SetColor = 8,
        SetHat = 9,
        SetSkin = 10,
        ReportDeadBody = 11,
        MurderPlayer = 12,
        SendChat = 13,
        StartMeeting = 14,
        SetScanner = 15,
        SendChatNote = 16,
        SetPet = 17,
        SetStartCounter = 18,
        EnterVent = 19,
        ExitVent = 20,
        SnapTo = 21,
        Close = 22,
        VotingComplete = 23,
        CastVote = 24,
        ClearVote = 25,
        AddVote = 26,
        CloseDoorsOfType = 27,
        RepairSystem = 28,
        SetTasks = 29,
        UpdateGameData = 30,
    }
}

wire_enum! {
    /// Sub-tags of an AlterGame message
    pub enum AlterGameTag {
        ChangePrivacy = 1,
    }
}

wire_enum! {
    /// Reasons sent with RemovePlayer and failed joins
    pub enum DisconnectReason {
        ExitGame = 0,
        GameFull = 1,
        GameStarted = 2,
        GameNotFound = 3,
        IncorrectVersion = 5,
        Banned = 6,
        Kicked = 7,
        Custom = 8,
        InvalidName = 9,
        Hacking = 10,
        Destroy = 16,
        Error = 17,
    }
}

wire_enum! {
    /// Reasons sent with EndGame
    pub enum GameOverReason {
        HumansByVote = 0,
        HumansByTask = 1,
        ImpostorByVote = 2,
        ImpostorByKill = 3,
        ImpostorBySabotage = 4,
        ImpostorDisconnect = 5,
        HumansDisconnect = 6,
    }
}

/// Bitset sent with every spawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpawnFlags(pub u8);

impl SpawnFlags {
    pub const NONE: Self = Self(0);
    pub const IS_CLIENT_CHARACTER: Self = Self(1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}
