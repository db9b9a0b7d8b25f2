use serenity::model::id::ChannelId;
use thiserror::Error;

/// Errores del dominio de reproducción.
///
/// Cada variante lleva un mensaje listo para mostrarse al usuario; la capa de
/// comandos los convierte en embeds sin reinterpretarlos.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MusicError {
    /// An operation needing a voice connection was invoked without one.
    #[error("The music bot is not connected to any voice channel.")]
    NotConnected,

    /// The caller is not in a voice channel.
    #[error("You need to be in a voice channel to use this command.")]
    NotInVoiceChannel,

    /// Redundant join to the channel the bot is already in.
    #[error("The music bot is already in <#{0}>.")]
    AlreadyConnected(ChannelId),

    /// Redundant pause/resume.
    #[error("The music bot is already {0}.")]
    AlreadyInState(&'static str),

    #[error("No music is being played right now.")]
    NothingPlaying,

    #[error("Looks like the queue is empty.")]
    EmptyQueue,

    /// Only the guild owner may move the bot out of a channel it is using.
    #[error("The music bot is already in <#{0}>.")]
    Unauthorized(ChannelId),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Could not find {0}.")]
    NotFound(String),

    /// The audio layer reported a failure mid-stream.
    #[error("Playback failed: {0}")]
    PlaybackFailure(String),

    #[error("Voice connection error: {0}")]
    Connection(String),
}

pub type MusicResult<T> = Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            MusicError::AlreadyInState("paused").to_string(),
            "The music bot is already paused."
        );
        assert_eq!(
            MusicError::AlreadyConnected(ChannelId::new(42)).to_string(),
            "The music bot is already in <#42>."
        );
        assert_eq!(
            MusicError::NotFound("song 7".to_string()).to_string(),
            "Could not find song 7."
        );
    }
}
