/// Squad specialisation. Cycled by follower index when auto-assignment is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Scout,
    Tank,
    Support,
    Dps,
    Interceptor,
}

/// Multiplicative modifiers a role carries. Callers decide which ones to honour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleModifiers {
    pub speed: f32,
    pub detection: f32,
    pub health: f32,
    pub shield: f32,
    pub healing: f32,
    pub damage: f32,
    pub fire_rate: f32,
}

const NEUTRAL: RoleModifiers = RoleModifiers {
    speed: 1.0,
    detection: 1.0,
    health: 1.0,
    shield: 1.0,
    healing: 1.0,
    damage: 1.0,
    fire_rate: 1.0,
};

impl Role {
    /// Follower cycle order.
    pub const CYCLE: [Role; 5] =
        [Role::Scout, Role::Tank, Role::Support, Role::Dps, Role::Interceptor];

    /// Role for follower `index`; the alpha is always dps.
    pub fn for_index(index: usize, is_alpha: bool) -> Self {
        if is_alpha {
            Role::Dps
        } else {
            Self::CYCLE[index % Self::CYCLE.len()]
        }
    }

    pub fn modifiers(self) -> RoleModifiers {
        match self {
            Role::Scout => RoleModifiers {
                speed: 1.3,
                detection: 1.5,
                health: 0.9,
                ..NEUTRAL
            },
            Role::Tank => RoleModifiers {
                speed: 0.8,
                detection: 0.9,
                health: 1.5,
                shield: 1.3,
                ..NEUTRAL
            },
            Role::Support => RoleModifiers {
                detection: 1.2,
                health: 1.1,
                healing: 1.5,
                ..NEUTRAL
            },
            Role::Dps => RoleModifiers {
                speed: 1.1,
                health: 0.9,
                damage: 1.5,
                fire_rate: 1.3,
                ..NEUTRAL
            },
            Role::Interceptor => RoleModifiers {
                speed: 1.4,
                detection: 1.3,
                health: 0.95,
                ..NEUTRAL
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Scout => "scout",
            Role::Tank => "tank",
            Role::Support => "support",
            Role::Dps => "dps",
            Role::Interceptor => "interceptor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_cycle_by_index() {
        assert_eq!(Role::for_index(0, false), Role::Scout);
        assert_eq!(Role::for_index(4, false), Role::Interceptor);
        assert_eq!(Role::for_index(5, false), Role::Scout);
        assert_eq!(Role::for_index(2, true), Role::Dps);
    }

    #[test]
    fn support_keeps_base_speed() {
        let m = Role::Support.modifiers();
        assert_eq!(m.speed, 1.0);
        assert_eq!(m.healing, 1.5);
    }
}
