//! Craft engine: recipe lookup, ingredient accounting, output routing.

use openclaw_protocol::{CraftRequest, CraftResult, HotbarState, InventoryState};
use serde_json::json;

use crate::hotbar::slot_index;
use crate::hub::WorldHub;

/// One recipe ingredient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingredient {
    pub resource_id: &'static str,
    pub amount: i64,
}

/// Where a recipe's output lands: a hotbar stack or a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeOutput {
    Slot { slot_id: &'static str, amount: i64 },
    Resource { resource_id: &'static str, amount: i64 },
}

/// Static recipe definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeConfig {
    pub id: &'static str,
    pub ingredients: &'static [Ingredient],
    pub output: RecipeOutput,
}

/// Look up a recipe by wire id.
pub fn recipe_config(recipe_id: &str) -> Option<RecipeConfig> {
    match recipe_id {
        "craft-bandage" => Some(RecipeConfig {
            id: "craft-bandage",
            ingredients: &[
                Ingredient {
                    resource_id: "fiber",
                    amount: 2,
                },
                Ingredient {
                    resource_id: "salvage",
                    amount: 1,
                },
            ],
            output: RecipeOutput::Slot {
                slot_id: "slot-4-bandage",
                amount: 1,
            },
        }),
        "craft-bomb" => Some(RecipeConfig {
            id: "craft-bomb",
            ingredients: &[
                Ingredient {
                    resource_id: "coal",
                    amount: 2,
                },
                Ingredient {
                    resource_id: "fiber",
                    amount: 1,
                },
            ],
            output: RecipeOutput::Slot {
                slot_id: "slot-5-bomb",
                amount: 1,
            },
        }),
        "craft-charcoal" => Some(RecipeConfig {
            id: "craft-charcoal",
            ingredients: &[Ingredient {
                resource_id: "wood",
                amount: 2,
            }],
            output: RecipeOutput::Resource {
                resource_id: "coal",
                amount: 1,
            },
        }),
        "craft-iron-ingot" => Some(RecipeConfig {
            id: "craft-iron-ingot",
            ingredients: &[
                Ingredient {
                    resource_id: "iron_ore",
                    amount: 2,
                },
                Ingredient {
                    resource_id: "coal",
                    amount: 1,
                },
            ],
            output: RecipeOutput::Resource {
                resource_id: "iron_ingot",
                amount: 1,
            },
        }),
        _ => None,
    }
}

impl WorldHub {
    /// Verify and apply one craft request.
    ///
    /// Ingredients scale with `count` and are checked against holdings
    /// before anything is deducted; deduction and output credit happen
    /// in one step.
    pub fn apply_craft_request(
        &mut self,
        request: &CraftRequest,
    ) -> (CraftResult, Option<InventoryState>, Option<HotbarState>) {
        let mut result = CraftResult {
            action_id: request.action_id.clone(),
            player_id: request.player_id.clone(),
            recipe_id: request.recipe_id.clone(),
            count: request.count,
            accepted: false,
            reason: String::new(),
            tick: self.tick,
        };

        if request.player_id.is_empty()
            || request.action_id.is_empty()
            || request.recipe_id.is_empty()
            || request.count <= 0
        {
            result.reason = "invalid_payload".to_string();
            self.record_craft_event(&result);
            return (result, None, None);
        }
        if !self.players.contains_key(&request.player_id) {
            result.reason = "player_not_found".to_string();
            self.record_craft_event(&result);
            return (result, None, None);
        }
        let Some(recipe) = recipe_config(&request.recipe_id) else {
            result.reason = "invalid_recipe".to_string();
            self.record_craft_event(&result);
            return (result, None, None);
        };

        {
            let inventory = self.ensure_inventory(&request.player_id);
            for ingredient in recipe.ingredients {
                let required = ingredient.amount * request.count;
                let held = *inventory.resources.get(ingredient.resource_id).unwrap_or(&0);
                if held < required {
                    result.reason = "insufficient_resources".to_string();
                    self.record_craft_event(&result);
                    return (result, None, None);
                }
            }
        }

        let output_slot_index = match recipe.output {
            RecipeOutput::Slot { slot_id, .. } => {
                let hotbar = self.ensure_hotbar(&request.player_id);
                match slot_index(hotbar, slot_id) {
                    Some(index) => Some(index),
                    None => {
                        result.reason = "craft_target_slot_missing".to_string();
                        self.record_craft_event(&result);
                        return (result, None, None);
                    }
                }
            }
            RecipeOutput::Resource { .. } => None,
        };

        let tick = self.tick;
        let mut inventory_snapshot = {
            let inventory = self.ensure_inventory(&request.player_id);
            for ingredient in recipe.ingredients {
                let required = ingredient.amount * request.count;
                *inventory
                    .resources
                    .entry(ingredient.resource_id.to_string())
                    .or_insert(0) -= required;
            }
            inventory.tick = tick;
            inventory.clone()
        };

        let hotbar_snapshot = match recipe.output {
            RecipeOutput::Slot { amount, .. } => {
                let hotbar = self.ensure_hotbar(&request.player_id);
                let index = output_slot_index.unwrap_or(0);
                hotbar.stack_counts[index] += amount * request.count;
                hotbar.tick = tick;
                Some(hotbar.clone())
            }
            RecipeOutput::Resource {
                resource_id,
                amount,
            } => {
                let inventory = self.ensure_inventory(&request.player_id);
                *inventory
                    .resources
                    .entry(resource_id.to_string())
                    .or_insert(0) += amount * request.count;
                inventory.tick = tick;
                inventory_snapshot = inventory.clone();
                None
            }
        };

        result.accepted = true;
        self.record_craft_event(&result);
        (result, Some(inventory_snapshot), hotbar_snapshot)
    }

    fn record_craft_event(&mut self, result: &CraftResult) {
        let kind = if result.accepted {
            "craft_completed"
        } else {
            "craft_rejected"
        };
        let mut payload = json!({
            "actionId": result.action_id,
            "recipeId": result.recipe_id,
            "count": result.count,
        });
        if !result.reason.is_empty() {
            payload["reason"] = json!(result.reason);
        }
        let tick = self.tick;
        self.events.record(tick, kind, &result.player_id, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use openclaw_protocol::JoinRequest;

    fn joined_hub(player_id: &str) -> WorldHub {
        let mut hub = WorldHub::new();
        hub.join(&JoinRequest {
            world_seed: "seed-craft".to_string(),
            player_id: player_id.to_string(),
            start_x: 0.0,
            start_z: 0.0,
        });
        hub
    }

    fn craft(player_id: &str, recipe_id: &str, count: i64) -> CraftRequest {
        CraftRequest {
            player_id: player_id.to_string(),
            action_id: "craft-1".to_string(),
            recipe_id: recipe_id.to_string(),
            count,
        }
    }

    #[test]
    fn test_slot_recipe_consumes_and_credits() {
        let mut hub = joined_hub("p-craft");
        hub.award_resources(
            "p-craft",
            &BTreeMap::from([("salvage".to_string(), 4), ("fiber".to_string(), 3)]),
        );

        let (result, inventory, hotbar) = hub.apply_craft_request(&craft("p-craft", "craft-bandage", 1));
        assert!(result.accepted, "{result:?}");
        let inventory = inventory.unwrap();
        assert_eq!(inventory.resources["salvage"], 3);
        assert_eq!(inventory.resources["fiber"], 1);
        let hotbar = hotbar.unwrap();
        assert_eq!(hotbar.stack_counts[3], 4, "bandage stack grows from 3 to 4");

        let (rejected, inventory, hotbar) =
            hub.apply_craft_request(&craft("p-craft", "craft-bandage", 2));
        assert_eq!(rejected.reason, "insufficient_resources");
        assert!(inventory.is_none() && hotbar.is_none());
    }

    #[test]
    fn test_resource_recipe_does_not_touch_hotbar() {
        let mut hub = joined_hub("p-charcoal");
        hub.award_resources("p-charcoal", &BTreeMap::from([("wood".to_string(), 2)]));

        let (result, inventory, hotbar) =
            hub.apply_craft_request(&craft("p-charcoal", "craft-charcoal", 1));
        assert!(result.accepted);
        assert!(hotbar.is_none());
        let inventory = inventory.unwrap();
        assert_eq!(inventory.resources["wood"], 0);
        assert_eq!(inventory.resources["coal"], 1);
    }

    #[test]
    fn test_count_scales_ingredients_and_output() {
        let mut hub = joined_hub("p-batch");
        hub.award_resources(
            "p-batch",
            &BTreeMap::from([("iron_ore".to_string(), 4), ("coal".to_string(), 2)]),
        );

        let (result, inventory, _) = hub.apply_craft_request(&craft("p-batch", "craft-iron-ingot", 2));
        assert!(result.accepted);
        let inventory = inventory.unwrap();
        assert_eq!(inventory.resources["iron_ore"], 0);
        assert_eq!(inventory.resources["coal"], 0);
        assert_eq!(inventory.resources["iron_ingot"], 2);
    }

    #[test]
    fn test_invalid_requests_are_rejected() {
        let mut hub = joined_hub("p-bad");

        let (missing_recipe, _, _) = hub.apply_craft_request(&craft("p-bad", "craft-castle", 1));
        assert_eq!(missing_recipe.reason, "invalid_recipe");

        let (zero_count, _, _) = hub.apply_craft_request(&craft("p-bad", "craft-bandage", 0));
        assert_eq!(zero_count.reason, "invalid_payload");

        let (unknown_player, _, _) = hub.apply_craft_request(&craft("ghost", "craft-bandage", 1));
        assert_eq!(unknown_player.reason, "player_not_found");
    }

    #[test]
    fn test_missing_output_slot_rejects_before_deduction() {
        let mut hub = joined_hub("p-slotless");
        hub.award_resources(
            "p-slotless",
            &BTreeMap::from([("salvage".to_string(), 1), ("fiber".to_string(), 2)]),
        );
        hub.hotbars.get_mut("p-slotless").unwrap().slot_ids =
            vec!["slot-1-rust-blade".to_string()];
        hub.hotbars.get_mut("p-slotless").unwrap().stack_counts = vec![0];

        let (result, inventory, hotbar) =
            hub.apply_craft_request(&craft("p-slotless", "craft-bandage", 1));
        assert_eq!(result.reason, "craft_target_slot_missing");
        assert!(inventory.is_none() && hotbar.is_none());
        assert_eq!(
            hub.inventory_state_for("p-slotless").unwrap().resources["fiber"],
            2,
            "ingredients must not be deducted on rejection"
        );
    }

    #[test]
    fn test_craft_events_logged() {
        let mut hub = joined_hub("p-events");
        hub.award_resources("p-events", &BTreeMap::from([("wood".to_string(), 2)]));
        hub.apply_craft_request(&craft("p-events", "craft-charcoal", 1));
        hub.apply_craft_request(&craft("p-events", "craft-charcoal", 1));

        let feed = hub.events_since(0);
        assert!(feed.events.iter().any(|event| event.kind == "craft_completed"));
        assert!(feed.events.iter().any(|event| event.kind == "craft_rejected"));
    }
}
