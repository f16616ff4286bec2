use crate::avatars::{self, AvatarImage};
use crate::config::AvatarPolicy;
use crate::forms::{push_error, FieldErrors, FormView, MultipartForm};

use super::repo::Profile;

pub const PROFILE_FIELDS: &[&str] = &["avatar", "bio", "location"];

const BIO_MAX: usize = 500;
const LOCATION_MAX: usize = 30;

#[derive(Debug)]
pub struct ProfileEdit {
    /// `None` keeps the current avatar (only possible under [`AvatarPolicy::Optional`]).
    pub avatar: Option<AvatarImage>,
    pub bio: String,
    pub location: String,
}

pub fn clean_profile_edit(
    mut form: MultipartForm,
    policy: AvatarPolicy,
    max_upload_bytes: usize,
) -> Result<ProfileEdit, FieldErrors> {
    let mut errors = FieldErrors::new();

    let bio = form.text("bio").trim().to_string();
    if bio.chars().count() > BIO_MAX {
        push_error(
            &mut errors,
            "bio",
            format!("Ensure this value has at most {BIO_MAX} characters."),
        );
    }

    let location = form.text("location").trim().to_string();
    if location.chars().count() > LOCATION_MAX {
        push_error(
            &mut errors,
            "location",
            format!("Ensure this value has at most {LOCATION_MAX} characters."),
        );
    }

    let avatar = match (form.take_file("avatar"), policy) {
        (Some(file), _) => match avatars::sniff(file, max_upload_bytes) {
            Ok(img) => Some(img),
            Err(msg) => {
                push_error(&mut errors, "avatar", msg);
                None
            }
        },
        (None, AvatarPolicy::Required) => {
            push_error(&mut errors, "avatar", "This field is required.");
            None
        }
        (None, AvatarPolicy::Optional) => None,
    };

    if errors.is_empty() {
        Ok(ProfileEdit {
            avatar,
            bio,
            location,
        })
    } else {
        Err(errors)
    }
}

pub fn profile_form(profile: &Profile) -> FormView {
    FormView::blank("profile", PROFILE_FIELDS).with_initial(serde_json::json!({
        "avatar": profile.avatar,
        "bio": profile.bio,
        "location": profile.location,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatars::png_bytes;
    use crate::forms::UploadedFile;

    fn with_avatar(fields: &[(&str, &str)]) -> MultipartForm {
        MultipartForm::from_parts(
            fields,
            vec![(
                "avatar",
                UploadedFile {
                    file_name: Some("me.png".into()),
                    content_type: Some("image/png".into()),
                    body: png_bytes(),
                },
            )],
        )
    }

    #[test]
    fn required_policy_rejects_edit_without_image() {
        let form = MultipartForm::from_parts(&[("bio", "hello")], vec![]);
        let errors = clean_profile_edit(form, AvatarPolicy::Required, 1024 * 1024).unwrap_err();
        assert_eq!(errors["avatar"], vec!["This field is required.".to_string()]);
    }

    #[test]
    fn optional_policy_keeps_current_image() {
        let form = MultipartForm::from_parts(&[("bio", "hello"), ("location", "Oslo")], vec![]);
        let edit = clean_profile_edit(form, AvatarPolicy::Optional, 1024 * 1024).unwrap();
        assert!(edit.avatar.is_none());
        assert_eq!(edit.bio, "hello");
        assert_eq!(edit.location, "Oslo");
    }

    #[test]
    fn blank_bio_and_location_are_fine() {
        let edit = clean_profile_edit(with_avatar(&[]), AvatarPolicy::Required, 1024 * 1024).unwrap();
        assert!(edit.avatar.is_some());
        assert!(edit.bio.is_empty());
        assert!(edit.location.is_empty());
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let bio = "x".repeat(BIO_MAX + 1);
        let location = "y".repeat(LOCATION_MAX + 1);
        let errors = clean_profile_edit(
            with_avatar(&[("bio", bio.as_str()), ("location", location.as_str())]),
            AvatarPolicy::Required,
            1024 * 1024,
        )
        .unwrap_err();
        assert!(errors.contains_key("bio"));
        assert!(errors.contains_key("location"));
        assert!(!errors.contains_key("avatar"));
    }

    #[test]
    fn form_view_prefills_current_values() {
        let profile = Profile {
            user_id: uuid::Uuid::new_v4(),
            avatar: "avatars/default.jpg".into(),
            bio: "hi".into(),
            location: "Riga".into(),
        };
        let view = serde_json::to_value(profile_form(&profile)).unwrap();
        assert_eq!(view["initial"]["location"], "Riga");
        assert_eq!(view["fields"], serde_json::json!(["avatar", "bio", "location"]));
    }
}
