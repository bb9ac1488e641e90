//! Built-in exercise library.
//!
//! Static catalog data, read-only to the core. Recommendation order is
//! the order of this list.

use crate::model::{Exercise, ExerciseCategory, ExerciseDifficulty};

/// The default exercise catalog shipped with the application.
pub fn default_catalog() -> Vec<Exercise> {
    vec![
        Exercise {
            id: "neck-stretches".into(),
            name: "Neck Stretches".into(),
            description: "Gentle neck stretches to relieve tension".into(),
            duration_secs: 120,
            difficulty: ExerciseDifficulty::Easy,
            category: ExerciseCategory::Stretching,
            video: "neck_stretches.mp4".into(),
            instructions: vec![
                "Slowly tilt your head to the right".into(),
                "Hold for 15 seconds".into(),
                "Return to center and repeat on the left side".into(),
            ],
            thumbnail: "neck_stretches_thumb.jpg".into(),
        },
        Exercise {
            id: "shoulder-rolls".into(),
            name: "Shoulder Rolls".into(),
            description: "Loosen up tight shoulders".into(),
            duration_secs: 90,
            difficulty: ExerciseDifficulty::Easy,
            category: ExerciseCategory::Mobility,
            video: "shoulder_rolls.mp4".into(),
            instructions: vec![
                "Roll shoulders forward in a circular motion".into(),
                "Repeat 10 times".into(),
                "Reverse direction and repeat".into(),
            ],
            thumbnail: "shoulder_rolls_thumb.jpg".into(),
        },
        Exercise {
            id: "hamstring-stretch".into(),
            name: "Standing Hamstring Stretch".into(),
            description: "Stretch the backs of your legs after sitting".into(),
            duration_secs: 150,
            difficulty: ExerciseDifficulty::Easy,
            category: ExerciseCategory::Stretching,
            video: "hamstring_stretch.mp4".into(),
            instructions: vec![
                "Place one heel on a low ledge or bumper".into(),
                "Hinge forward at the hips until you feel a stretch".into(),
                "Hold 30 seconds per side".into(),
            ],
            thumbnail: "hamstring_stretch_thumb.jpg".into(),
        },
        Exercise {
            id: "hip-circles".into(),
            name: "Hip Circles".into(),
            description: "Open up stiff hips".into(),
            duration_secs: 120,
            difficulty: ExerciseDifficulty::Medium,
            category: ExerciseCategory::Mobility,
            video: "hip_circles.mp4".into(),
            instructions: vec![
                "Stand with hands on hips".into(),
                "Draw slow circles with your hips, 10 per direction".into(),
            ],
            thumbnail: "hip_circles_thumb.jpg".into(),
        },
        Exercise {
            id: "brisk-walk".into(),
            name: "Brisk Walk".into(),
            description: "Get the blood flowing with a short walk".into(),
            duration_secs: 300,
            difficulty: ExerciseDifficulty::Easy,
            category: ExerciseCategory::Cardio,
            video: "brisk_walk.mp4".into(),
            instructions: vec![
                "Walk at a pace that raises your heart rate".into(),
                "Swing your arms and keep your head up".into(),
            ],
            thumbnail: "brisk_walk_thumb.jpg".into(),
        },
        Exercise {
            id: "jumping-jacks".into(),
            name: "Jumping Jacks".into(),
            description: "Quick full-body wake-up".into(),
            duration_secs: 180,
            difficulty: ExerciseDifficulty::Medium,
            category: ExerciseCategory::Cardio,
            video: "jumping_jacks.mp4".into(),
            instructions: vec![
                "Jump feet out while raising arms overhead".into(),
                "Return and repeat at a steady rhythm".into(),
            ],
            thumbnail: "jumping_jacks_thumb.jpg".into(),
        },
        Exercise {
            id: "wall-pushups".into(),
            name: "Wall Push-ups".into(),
            description: "Upper-body activation without getting on the ground".into(),
            duration_secs: 150,
            difficulty: ExerciseDifficulty::Medium,
            category: ExerciseCategory::Strength,
            video: "wall_pushups.mp4".into(),
            instructions: vec![
                "Place palms on a wall at shoulder height".into(),
                "Lower your chest toward the wall, then push back".into(),
                "Two sets of 12".into(),
            ],
            thumbnail: "wall_pushups_thumb.jpg".into(),
        },
        Exercise {
            id: "calf-raises".into(),
            name: "Calf Raises".into(),
            description: "Wake up your lower legs".into(),
            duration_secs: 120,
            difficulty: ExerciseDifficulty::Easy,
            category: ExerciseCategory::Strength,
            video: "calf_raises.mp4".into(),
            instructions: vec![
                "Rise onto the balls of your feet".into(),
                "Lower slowly; repeat 15 times".into(),
            ],
            thumbnail: "calf_raises_thumb.jpg".into(),
        },
    ]
}
